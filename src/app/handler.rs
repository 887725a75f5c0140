//! Key handling for the interactive browser.
//!
//! [`handle_key`] only mutates the view state and names the side effect to run;
//! [`crate::app::App::perform`] executes the returned [`Action`].

use crate::app::state::{AppState, ChangelogView, ConfirmOverlay, ListView};
use crate::core::lock_url::lock_url;
use crate::core::resolver::resolve;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    UpdateSelected(Vec<String>),
    UpdateAll,
    Refresh,
    /// The state is now a pending changelog; load it
    OpenChangelog,
    ConfirmLock { name: String, lock_url: String },
    Warn(String),
}

pub fn handle_key(state: &mut AppState, key: KeyEvent) -> Action {
    if key.kind == KeyEventKind::Release {
        return Action::None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        *state = AppState::Quitting;
        return Action::Quit;
    }

    match state {
        AppState::Loading | AppState::Quitting => Action::None,
        AppState::Error(_) => {
            *state = AppState::Quitting;
            Action::Quit
        }
        AppState::List(list) => match handle_list_key(list, key.code) {
            ListOutcome::Stay(action) => action,
            ListOutcome::Quit => {
                *state = AppState::Quitting;
                Action::Quit
            }
            ListOutcome::OpenChangelog => open_changelog(state),
        },
        AppState::Changelog(view) if view.overlay.is_some() => handle_confirm_key(view, key.code),
        AppState::Changelog(_) => handle_changelog_key(state, key.code),
    }
}

enum ListOutcome {
    Stay(Action),
    Quit,
    OpenChangelog,
}

fn handle_list_key(list: &mut ListView, code: KeyCode) -> ListOutcome {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            if list.selected.is_empty() {
                return ListOutcome::Quit;
            }
            list.clear_selection();
        }
        KeyCode::Char('j') | KeyCode::Down => list.cursor_down(),
        KeyCode::Char('k') | KeyCode::Up => list.cursor_up(),
        KeyCode::Char(' ') if !list.busy => list.toggle_selection(),
        KeyCode::Char('u') if !list.busy => {
            let names = list.selected_names();
            if names.is_empty() {
                return ListOutcome::Stay(Action::Warn("No inputs selected".to_string()));
            }
            list.busy = true;
            return ListOutcome::Stay(Action::UpdateSelected(names));
        }
        KeyCode::Char('U') if !list.busy && !list.is_empty() => {
            list.busy = true;
            return ListOutcome::Stay(Action::UpdateAll);
        }
        KeyCode::Char('r') if !list.busy => return ListOutcome::Stay(Action::Refresh),
        KeyCode::Char('c') | KeyCode::Enter if !list.busy => {
            return match list.current() {
                None => ListOutcome::Stay(Action::None),
                Some(input) if resolve(input).is_none() => ListOutcome::Stay(Action::Warn(
                    format!("{} has no remote history", input.name),
                )),
                Some(_) => ListOutcome::OpenChangelog,
            };
        }
        _ => {}
    }
    ListOutcome::Stay(Action::None)
}

fn open_changelog(state: &mut AppState) -> Action {
    let AppState::List(list) = std::mem::replace(state, AppState::Loading) else {
        return Action::None;
    };
    let Some((input, info)) = list
        .current()
        .and_then(|input| resolve(input).map(|info| (input.clone(), info)))
    else {
        *state = AppState::List(list);
        return Action::None;
    };
    // The request id is stamped by `App` before the load is spawned
    *state = AppState::Changelog(ChangelogView::pending(list, input, info, 0));
    Action::OpenChangelog
}

fn handle_changelog_key(state: &mut AppState, code: KeyCode) -> Action {
    if matches!(code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace) {
        // Any load still in flight is discarded when it arrives
        if let AppState::Changelog(view) = std::mem::replace(state, AppState::Loading) {
            *state = AppState::List(view.parent);
        }
        return Action::None;
    }
    let AppState::Changelog(view) = state else {
        return Action::None;
    };
    match code {
        KeyCode::Char('j') | KeyCode::Down => view.cursor_down(),
        KeyCode::Char('k') | KeyCode::Up => view.cursor_up(),
        KeyCode::Char(' ') | KeyCode::Enter if !view.parent.busy => {
            let Some(commit) = view.current_commit().cloned() else {
                return Action::None;
            };
            let url = lock_url(&view.input, &view.info, &commit.sha);
            view.overlay = Some(ConfirmOverlay {
                commit,
                lock_url: url,
                in_flight: false,
            });
        }
        _ => {}
    }
    Action::None
}

fn handle_confirm_key(view: &mut ChangelogView, code: KeyCode) -> Action {
    let Some(overlay) = view.overlay.as_mut() else {
        return Action::None;
    };
    if overlay.in_flight {
        return Action::None;
    }
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            overlay.in_flight = true;
            view.parent.busy = true;
            Action::ConfirmLock {
                name: view.input.name.clone(),
                lock_url: overlay.lock_url.clone(),
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Char('q') | KeyCode::Esc => {
            view.overlay = None;
            Action::None
        }
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{ChangelogLoad, StateKind};
    use crate::core::commit::{ChangelogResult, Commit};
    use crate::core::input::{Flake, FlakeInput, InputKind};
    use chrono::Utc;
    use std::path::PathBuf;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn list_state() -> AppState {
        let inputs = vec![
            FlakeInput::new("local", InputKind::Path, "path:./sub"),
            FlakeInput::new("nixpkgs", InputKind::GitHub, "github:NixOS/nixpkgs")
                .with_repo("NixOS", "nixpkgs")
                .with_rev("abcdef0123456789"),
        ];
        AppState::List(ListView::new(Flake::new(PathBuf::from("/f"), None, inputs)))
    }

    fn ready_changelog() -> AppState {
        let mut state = list_state();
        handle_key(&mut state, key(KeyCode::Char('j')));
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('c'))), Action::OpenChangelog);
        if let AppState::Changelog(view) = &mut state {
            view.set_ready(ChangelogResult {
                commits: vec![
                    Commit::new("1111111111", "new", "a", Utc::now()),
                    Commit::new("abcdef0123456789", "pinned", "b", Utc::now()),
                ],
                pinned_index: Some(1),
            });
        }
        state
    }

    #[test]
    fn test_quit_clears_selection_first() {
        let mut state = list_state();
        handle_key(&mut state, key(KeyCode::Char(' ')));
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('q'))), Action::None);
        assert_eq!(state.kind(), StateKind::List);
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(state.kind(), StateKind::Quitting);
    }

    #[test]
    fn test_update_without_selection_warns() {
        let mut state = list_state();
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('u'))),
            Action::Warn("No inputs selected".to_string())
        );
    }

    #[test]
    fn test_busy_list_ignores_mutating_keys() {
        let mut state = list_state();
        handle_key(&mut state, key(KeyCode::Char(' ')));
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('u'))),
            Action::UpdateSelected(vec!["local".to_string()])
        );
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('U'))), Action::None);
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('r'))), Action::None);
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('c'))), Action::None);
    }

    #[test]
    fn test_changelog_needs_a_remote() {
        let mut state = list_state();
        let action = handle_key(&mut state, key(KeyCode::Char('c')));
        assert!(matches!(action, Action::Warn(_)));
        assert_eq!(state.kind(), StateKind::List);
    }

    #[test]
    fn test_confirm_overlay_flow() {
        let mut state = ready_changelog();
        handle_key(&mut state, key(KeyCode::Char(' ')));
        assert_eq!(state.kind(), StateKind::Confirm);

        handle_key(&mut state, key(KeyCode::Esc));
        assert_eq!(state.kind(), StateKind::Changelog);

        handle_key(&mut state, key(KeyCode::Enter));
        let action = handle_key(&mut state, key(KeyCode::Char('y')));
        assert_eq!(
            action,
            Action::ConfirmLock {
                name: "nixpkgs".to_string(),
                lock_url: "github:NixOS/nixpkgs/1111111111".to_string(),
            }
        );
        // A second confirmation while the lock runs does nothing
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('y'))), Action::None);
    }

    #[test]
    fn test_leaving_pending_changelog_returns_to_list() {
        let mut state = list_state();
        handle_key(&mut state, key(KeyCode::Down));
        handle_key(&mut state, key(KeyCode::Enter));
        if let AppState::Changelog(view) = &state {
            assert!(matches!(view.load, ChangelogLoad::Pending { .. }));
        }
        handle_key(&mut state, key(KeyCode::Esc));
        assert_eq!(state.kind(), StateKind::List);
        assert_eq!(state.list().map(|l| l.cursor), Some(1));
    }

    #[test]
    fn test_ctrl_c_quits_from_anywhere() {
        let mut state = ready_changelog();
        let action = handle_key(
            &mut state,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert_eq!(action, Action::Quit);
        assert_eq!(state.kind(), StateKind::Quitting);
    }
}

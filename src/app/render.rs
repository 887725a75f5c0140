//! Drawing for every browser state.

use crate::app::state::{AppState, ChangelogLoad, ChangelogView, ConfirmOverlay, ListView};
use crate::app::App;
use crate::core::aggregator::UpdateStatus;
use crate::core::commit::Commit;
use crate::core::error::HistoryError;
use crate::core::status::{MessageLevel, StatusMessage};
use crate::core::time::format_timestamp;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(frame.area());

    draw_header(frame, chunks[0], app);
    match app.state() {
        AppState::Loading | AppState::Quitting => {
            let text = format!("{} Loading flake metadata", spinner(app.tick()));
            frame.render_widget(Paragraph::new(text), chunks[1]);
        }
        AppState::Error(message) => {
            let text = vec![
                Line::from(Span::styled(
                    "Could not load the flake",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(message.as_str()),
                Line::from(""),
                Line::from(Span::styled(
                    "Press any key to exit",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), chunks[1]);
        }
        AppState::List(list) => draw_list(frame, chunks[1], list, app.tick()),
        AppState::Changelog(view) => {
            draw_changelog(frame, chunks[1], view, app.tick());
            if let Some(overlay) = &view.overlay {
                draw_confirm(frame, &view.input.name, overlay, app.tick());
            }
        }
    }
    draw_status_bar(frame, chunks[2], app);
}

fn spinner(tick: usize) -> &'static str {
    SPINNER[(tick / 4) % SPINNER.len()]
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(
            " flake-navigator ",
            Style::default().fg(Color::Black).bg(Color::White),
        ),
        Span::raw("  "),
        Span::raw(app.flake_path().display().to_string()),
    ];
    if let Some(description) = app
        .state()
        .list()
        .and_then(|list| list.flake.description.as_deref())
    {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(description, Style::default().fg(Color::DarkGray)));
    }
    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn status_cell(status: Option<&UpdateStatus>, tick: usize) -> Cell<'static> {
    let Some(status) = status else {
        return Cell::from("");
    };
    let style = match status {
        UpdateStatus::Loading => Style::default().fg(Color::DarkGray),
        UpdateStatus::Done { commits_behind: 0 } => Style::default().fg(Color::Green),
        UpdateStatus::Done { .. } => Style::default().fg(Color::Yellow),
        UpdateStatus::Failed(HistoryError::RateLimited { .. }) => {
            Style::default().fg(Color::Magenta)
        }
        UpdateStatus::Failed(_) => Style::default().fg(Color::Red),
    };
    let text = match status {
        UpdateStatus::Loading => format!("{} {}", spinner(tick), status.label()),
        _ => status.label(),
    };
    Cell::from(text).style(style)
}

fn draw_list(frame: &mut Frame, area: Rect, list: &ListView, tick: usize) {
    let rows: Vec<Row> = list
        .flake
        .inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let marker = if list.selected.contains(&index) { "●" } else { " " };
            let mut style = Style::default();
            if index == list.cursor {
                style = style.bg(Color::DarkGray);
            }
            Row::new(vec![
                Cell::from(marker).style(Style::default().fg(Color::Cyan)),
                Cell::from(input.name.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(input.kind.as_str().to_string()).style(Style::default().fg(Color::Cyan)),
                Cell::from(input.short_rev().to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_timestamp(input.last_modified)),
                status_cell(list.status(&input.name), tick),
            ])
            .style(style)
        })
        .collect();

    let title = if list.busy {
        format!(" Inputs ({}) {} working ", list.len(), spinner(tick))
    } else {
        format!(" Inputs ({}) ", list.len())
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Percentage(30),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(16),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["", "NAME", "KIND", "REV", "UPDATED", "STATUS"])
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

fn commit_row<'a>(commit: &'a Commit, selected: bool) -> Row<'a> {
    let mut style = Style::default();
    if commit.is_pinned {
        style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
    }
    if selected {
        style = style.bg(Color::DarkGray);
    }
    Row::new(vec![
        Cell::from(if commit.is_pinned { "▶" } else { " " }),
        Cell::from(commit.short_sha()),
        Cell::from(commit.formatted_date()),
        Cell::from(commit.author.as_str()),
        Cell::from(commit.message.as_str()),
    ])
    .style(style)
}

fn draw_changelog(frame: &mut Frame, area: Rect, view: &ChangelogView, tick: usize) {
    let title = format!(" {} · {} ", view.input.name, view.info);
    let block = Block::default().borders(Borders::ALL).title(title);

    let changelog = match &view.load {
        ChangelogLoad::Pending { .. } => {
            let text = format!("{} Fetching history", spinner(tick));
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }
        ChangelogLoad::Ready(changelog) => changelog,
    };
    if changelog.is_empty() {
        frame.render_widget(Paragraph::new("No commits found").block(block), area);
        return;
    }

    let mut rows = Vec::with_capacity(changelog.commits.len() + 1);
    for (index, commit) in changelog.commits.iter().enumerate() {
        // Divider between the newer commits and the pin's ancestry
        if Some(index) == changelog.pinned_index && index > 0 {
            rows.push(
                Row::new(vec![Cell::from(""), Cell::from(format!("── {index} newer ──"))])
                    .style(Style::default().fg(Color::DarkGray)),
            );
        }
        rows.push(commit_row(commit, index == view.cursor));
    }

    let summary = match changelog.pinned_index {
        Some(0) => "up to date".to_string(),
        Some(ahead) => format!("{ahead} newer than the pin"),
        None => "pinned revision not in listing".to_string(),
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(8),
            Constraint::Length(16),
            Constraint::Length(20),
            Constraint::Min(20),
        ],
    )
    .header(
        Row::new(vec!["", "SHA", "DATE", "AUTHOR", "MESSAGE"])
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
    )
    .block(block.title_bottom(format!(" {summary} ")));
    frame.render_widget(table, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn draw_confirm(frame: &mut Frame, name: &str, overlay: &ConfirmOverlay, tick: usize) {
    let area = centered(frame.area(), 72, 9);
    frame.render_widget(Clear, area);

    let prompt = if overlay.in_flight {
        Line::from(format!("{} Locking", spinner(tick)))
    } else {
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" lock   "),
            Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ])
    };
    let text = vec![
        Line::from(vec![
            Span::raw("Pin "),
            Span::styled(name, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" to "),
            Span::styled(overlay.commit.short_sha(), Style::default().fg(Color::Yellow)),
            Span::raw("?"),
        ]),
        Line::from(Span::styled(
            overlay.commit.message.as_str(),
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(Span::styled(
            overlay.lock_url.as_str(),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(""),
        prompt,
    ];
    frame.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Confirm ")),
        area,
    );
}

fn key_hints(app: &App) -> &'static str {
    match app.state() {
        AppState::Loading | AppState::Quitting => "ctrl-c quit",
        AppState::Error(_) => "any key quit",
        AppState::List(_) => {
            "j/k move  space select  u update  U update all  c changelog  r refresh  q quit"
        }
        AppState::Changelog(view) if view.overlay.is_some() => "y confirm  n cancel",
        AppState::Changelog(_) => "j/k move  space pin commit  esc back",
    }
}

fn message_style(message: &StatusMessage) -> Style {
    match message.level {
        MessageLevel::Info => Style::default().fg(Color::White),
        MessageLevel::Success => Style::default().fg(Color::Green),
        MessageLevel::Warning => Style::default().fg(Color::Yellow),
        MessageLevel::Error => Style::default().fg(Color::Red),
    }
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let line = match app.message() {
        Some(message) => Line::from(Span::styled(message.text.as_str(), message_style(message))),
        None if app.is_checking() => Line::from(Span::styled(
            format!("{} checking for updates", spinner(app.tick())),
            Style::default().fg(Color::DarkGray),
        )),
        None => Line::from(Span::styled(key_hints(app), Style::default().fg(Color::DarkGray))),
    };
    frame.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::TOP)),
        area,
    );
}

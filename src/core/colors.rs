//! Color mapping for update statuses in CLI output.
//!
//! # Public API
//! - [`get_status_color_style`]: Get color function for an update status
//! - [`format_input_line`]: One aligned, colored line per input
//!
//! # Color Scheme
//! - **Up to date**: Green
//! - **Behind**: Yellow
//! - **Checking**: Bright black
//! - **Rate limited**: Magenta
//! - **Failed**: Red
//! - **No remote**: Bright black name, no status

use crate::core::aggregator::UpdateStatus;
use crate::core::error::HistoryError;
use crate::core::input::FlakeInput;
use crate::core::time::format_timestamp;
use colored::*;

/// Returns a closure that colors any text the way `status` is shown
pub fn get_status_color_style(status: &UpdateStatus) -> Box<dyn Fn(&str) -> ColoredString> {
    match status {
        UpdateStatus::Loading => Box::new(|text: &str| text.bright_black()),
        UpdateStatus::Done { commits_behind: 0 } => Box::new(|text: &str| text.green()),
        UpdateStatus::Done { .. } => Box::new(|text: &str| text.yellow()),
        UpdateStatus::Failed(HistoryError::RateLimited { .. }) => {
            Box::new(|text: &str| text.magenta())
        }
        UpdateStatus::Failed(_) => Box::new(|text: &str| text.red()),
    }
}

/// `name  kind  rev  age  status`, padded to `name_width`
pub fn format_input_line(
    input: &FlakeInput,
    status: Option<&UpdateStatus>,
    name_width: usize,
) -> String {
    let name = format!("{:<name_width$}", input.name);
    let kind = format!("{:<9}", input.kind.as_str());
    let rev = format!("{:<7}", input.short_rev());
    let age = format!("{:<14}", format_timestamp(input.last_modified));

    match status {
        Some(status) => {
            let color_fn = get_status_color_style(status);
            format!(
                "{} {} {} {} {}",
                name.white().bold(),
                kind.cyan(),
                rev.bright_black(),
                age.bright_black(),
                color_fn(&status.label())
            )
        }
        None => format!(
            "{} {} {} {}",
            name.bright_black(),
            kind.cyan(),
            rev.bright_black(),
            age.bright_black()
        ),
    }
}

use crate::app::Services;
use crate::core::{
    aggregator::{SweepOutcome, UpdateStatus},
    colors::format_input_line,
    config::{ApiTokens, EngineConfig},
    error::{HistoryError, Result},
    nix::resolve_flake_path,
    print_info, print_section_header, print_warning,
};
use colored::*;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Print every input of the flake with its update status
pub async fn execute_status(flake: &Path) -> Result<()> {
    let flake_path = resolve_flake_path(flake)?;
    let config = EngineConfig::load_or_default()?;
    let tokens = ApiTokens::from_env();
    let authenticated = tokens.is_authenticated();

    let cancel = CancellationToken::new();
    let services = Services::with_defaults(&config, tokens, cancel)?;
    let flake = services.nix.load_metadata(&flake_path).await?;

    if flake.inputs.is_empty() {
        print_info(&format!("{} has no inputs", flake.path.display()));
        return Ok(());
    }

    let statuses = match services
        .checker
        .check_all(&flake.inputs, |name, status| {
            if status.is_terminal() {
                log::debug!("{name}: {}", status.label());
            }
        })
        .await
    {
        SweepOutcome::Completed(statuses) => statuses,
        SweepOutcome::Skipped | SweepOutcome::Cancelled => HashMap::new(),
    };

    let header = match &flake.description {
        Some(description) => format!("{} ({})", flake.path.display(), description),
        None => flake.path.display().to_string(),
    };
    print_section_header(&header);

    let name_width = flake
        .inputs
        .iter()
        .map(|input| input.name.len())
        .max()
        .unwrap_or(0);
    for input in &flake.inputs {
        println!("  {}", format_input_line(input, statuses.get(&input.name), name_width));
    }
    println!();

    print_summary(&statuses);
    print_rate_limit_hints(&statuses, authenticated);
    Ok(())
}

fn print_summary(statuses: &HashMap<String, UpdateStatus>) {
    let behind = statuses
        .values()
        .filter(|status| matches!(status, UpdateStatus::Done { commits_behind } if *commits_behind > 0))
        .count();
    let failed = statuses
        .values()
        .filter(|status| matches!(status, UpdateStatus::Failed(_)))
        .count();

    let mut parts = vec![format!("{} checked", statuses.len())];
    if behind > 0 {
        parts.push(format!("{behind} behind").yellow().to_string());
    }
    if failed > 0 {
        parts.push(format!("{failed} failed").red().to_string());
    }
    println!("{}\n", parts.join(", "));
}

fn print_rate_limit_hints(statuses: &HashMap<String, UpdateStatus>, authenticated: bool) {
    let forges: BTreeSet<&str> = statuses
        .values()
        .filter_map(|status| match status {
            UpdateStatus::Failed(HistoryError::RateLimited { forge }) => Some(forge.as_str()),
            _ => None,
        })
        .collect();

    for forge in forges {
        if authenticated {
            print_warning(&format!("Rate limited by {forge}"));
        } else {
            print_warning(&format!(
                "Rate limited by {forge}; set an API token (e.g. GITHUB_TOKEN) for a higher limit"
            ));
        }
    }
}

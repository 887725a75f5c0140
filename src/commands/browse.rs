use crate::app::{App, Services, Tui};
use crate::core::{
    config::{ApiTokens, EngineConfig},
    error::Result,
    nix::resolve_flake_path,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Open the interactive browser on the flake at `flake`
pub async fn execute_browse(flake: &Path) -> Result<()> {
    let flake_path = resolve_flake_path(flake)?;
    let config = EngineConfig::load_or_default()?;
    let tokens = ApiTokens::from_env();
    log::debug!(
        "Browsing {} ({} API access)",
        flake_path.display(),
        if tokens.is_authenticated() { "authenticated" } else { "anonymous" }
    );

    let cancel = CancellationToken::new();
    let services = Services::with_defaults(&config, tokens, cancel.clone())?;
    let mut app = App::new(flake_path, services, cancel.clone());

    let mut tui = Tui::enter()?;
    let result = app.run(&mut tui).await;
    drop(tui);

    // Covers exits through an error as well as a normal quit
    cancel.cancel();
    result
}

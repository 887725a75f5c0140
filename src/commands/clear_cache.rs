use crate::core::{
    cache::CloneCache,
    dirs::get_clone_cache_directory,
    error::Result,
    print_info, print_success,
    process::CommandRunner,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn execute_clear_cache() -> Result<()> {
    let root = get_clone_cache_directory()?;
    // Clearing never spawns git; the runner is only needed to build the cache
    let cache = CloneCache::new(&root, CommandRunner::new(CancellationToken::new(), Duration::ZERO));

    if cache.clear()? {
        print_success(&format!("Removed clone cache at {}", root.display()));
    } else {
        print_info(&format!("No clone cache at {}", root.display()));
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use flake_navigator::commands::*;
use flake_navigator::core::{
    logging::{self, LogTarget},
    print_error,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flake-navigator")]
#[command(about = "Browse, check and pin the inputs of a Nix flake")]
#[command(version)]
struct Cli {
    /// Flake directory or flake.nix file [default: .]
    flake: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every input for upstream commits and print the result
    Status {
        /// Flake directory or flake.nix file, overriding the one before the command
        flake: Option<PathBuf>,
    },
    /// Delete the cached bare clones
    ClearCache,
}

#[tokio::main]
async fn main() {
    let Cli {
        flake: top_level_flake,
        debug,
        command,
    } = Cli::parse();
    let flake_or_cwd = |flake: Option<PathBuf>| {
        flake
            .or_else(|| top_level_flake.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    };

    let result = match command {
        None => {
            // The browser owns the terminal, so logs go to a file
            logging::init(debug, LogTarget::File);
            execute_browse(&flake_or_cwd(None)).await
        }
        Some(Commands::Status { flake }) => {
            logging::init(debug, LogTarget::Stderr);
            execute_status(&flake_or_cwd(flake)).await
        }
        Some(Commands::ClearCache) => {
            logging::init(debug, LogTarget::Stderr);
            execute_clear_cache()
        }
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

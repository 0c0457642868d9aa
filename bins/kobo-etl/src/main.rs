mod cmd;
mod config;
mod error;

use std::path::PathBuf;

use clap::Parser;
use config::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Before tracing and clap: RUST_LOG and every env fallback may come from it.
    let env_file = std::env::var_os(config::ENV_FILE_VAR).map(PathBuf::from);
    let dotenv = config::load_dotenv(env_file.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded dotenv file"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Load(args) => cmd::load::run(args).await,
        Commands::Inspect(args) => cmd::inspect::run(args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

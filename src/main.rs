//! cgm-link CLI binary entry point.

use std::sync::Arc;

use cgm_link::auth::TokenManager;
use cgm_link::cli::{AuthCommands, Cli, Commands};
use cgm_link::error::Result;
use cgm_link::readings::GlucoseClient;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let manager = Arc::new(TokenManager::new(&config, config.file_token_store())?);

    match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Url { state } => cgm_link::cli::auth::handle_url(&manager, state.as_deref()),
            AuthCommands::Login { code } => cgm_link::cli::auth::handle_login(&manager, &code).await,
            AuthCommands::Status => cgm_link::cli::auth::handle_status(&manager).await,
            AuthCommands::Logout => cgm_link::cli::auth::handle_logout(&manager).await,
        },
        Commands::Readings(args) => {
            let client = GlucoseClient::new(&config, manager);
            cgm_link::cli::readings::handle_readings(&client, args.minutes).await
        }
        Commands::Latest => {
            let client = GlucoseClient::new(&config, manager);
            cgm_link::cli::readings::handle_latest(&client).await
        }
    }
}

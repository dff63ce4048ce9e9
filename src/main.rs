use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use vehicles_service::app::build_mediator;
use vehicles_service::auth::{token_digest, TokenVerifier};
use vehicles_service::config::{Config, DatabaseBackend};
use vehicles_service::server::{start_server, AppState};
use vehicles_service::storage::SqliteStorage;
use vehicles_service::{logging, metrics, open_storage};

#[derive(Parser)]
#[command(name = "vehicles_service")]
#[command(about = "Vehicle catalog REST service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Path to config.toml
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the SQLite schema and exit
    Migrate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the SHA-256 digest of a bearer token for the [auth] section
    HashToken { token: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let mut config = Config::load(config.as_deref()).context("loading configuration")?;
            if let Some(port) = port {
                config.server.port = port;
            }
            let _guard = logging::init_logging(&config.logging)?;
            serve(config).await
        }
        Commands::Migrate { config } => {
            let config = Config::load(config.as_deref()).context("loading configuration")?;
            let _guard = logging::init_logging(&config.logging)?;
            if config.database.backend != DatabaseBackend::Sqlite {
                warn!("Database backend is not sqlite; nothing to migrate");
                return Ok(());
            }
            // Opening applies the embedded migration
            SqliteStorage::open(&config.database.path)
                .with_context(|| format!("migrating {}", config.database.path.display()))?;
            info!("Schema ready at {}", config.database.path.display());
            Ok(())
        }
        Commands::HashToken { token } => {
            println!("{}", token_digest(&token));
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        "Starting vehicles service v{} ({:?} storage)",
        env!("CARGO_PKG_VERSION"),
        config.database.backend
    );

    if config.metrics.enabled {
        metrics::init_metrics();
    }

    let storage = open_storage(&config).context("opening storage")?;
    let mediator = build_mediator(storage).context("registering handlers")?;
    let verifier = TokenVerifier::from_config(&config.auth.tokens).context("loading API tokens")?;
    info!(
        "{} request handlers, {} API clients",
        mediator.handler_count(),
        verifier.client_count()
    );

    let state = AppState::new(mediator, verifier).with_metrics(config.metrics.enabled);
    start_server(&config.server, state).await
}

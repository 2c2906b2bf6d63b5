use anyhow::{Context, Result};
use chatdeck::config::Config;
use chatdeck::core::ChatContext;
use chatdeck::storage::{self, SessionStore, SqliteSession};
use chatdeck::transport::{self, cli::HistoryFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chatdeck")]
#[command(author, version, about = "chatdeck - browser chat for a hosted agent with web, file, image, code and MCP tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat UI
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Keep history in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Print the stored conversation
    History {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = HistoryFormat::Text)]
        format: HistoryFormat,
    },

    /// Clear the stored conversation
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "chatdeck=debug,tower_http=debug"
    } else {
        "chatdeck=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();

    match cli.command {
        Commands::Serve {
            port,
            host,
            ephemeral,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }

            let session: Arc<dyn SessionStore> = if ephemeral {
                tracing::info!("Using in-memory session; history is discarded on exit");
                Arc::new(SqliteSession::in_memory(&config.session.conversation_id)?)
            } else {
                tracing::info!(
                    db_path = %config.session.db_path.display(),
                    "Using session database"
                );
                Arc::new(open_session(&config)?)
            };

            let ctx = ChatContext::from_config(&config, session)?;
            transport::http::run_http_server(&config.server, Arc::new(ctx)).await?;
        }
        Commands::History { format } => {
            let session = open_session(&config)?;
            transport::cli::run_history(&session, format).await?;
        }
        Commands::Reset => {
            let session = open_session(&config)?;
            transport::cli::run_reset(&session).await?;
        }
    }

    Ok(())
}

fn open_session(config: &Config) -> Result<SqliteSession> {
    storage::open_session(&config.session).with_context(|| {
        format!(
            "Failed to open session database {}",
            config.session.db_path.display()
        )
    })
}

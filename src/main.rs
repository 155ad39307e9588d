use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use paintwise::catalog::{Environment, ProductFilters};
use paintwise::{cli, config, server};

#[derive(Parser)]
#[command(name = "paintwise", version, about = "Paint catalog assistant: hybrid product search and conversation memory over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport by default)
    Serve {
        /// Serve over Streamable HTTP on server.host:server.port instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Search the catalog
    Search {
        /// Natural language query; omit to filter by attributes only
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        threshold: Option<f32>,
        /// internal, external or both
        #[arg(long)]
        environment: Option<Environment>,
        #[arg(long)]
        finish: Option<String>,
        #[arg(long)]
        line: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Required feature (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
        /// Required surface type (repeatable)
        #[arg(long = "surface")]
        surfaces: Vec<String>,
    },
    /// Compute embeddings for products that have none
    Backfill {
        /// Recompute every product (after changing the embedding model)
        #[arg(long)]
        force: bool,
    },
    /// Generate AI summaries and usage tags
    Enrich {
        /// Regenerate for products that already have a summary
        #[arg(long)]
        force: bool,
    },
    /// Import catalog products from a JSON file
    Import { file: PathBuf },
    /// List a user's conversation sessions
    Sessions {
        user_id: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Chat with the assistant in the terminal
    Chat {
        #[arg(long)]
        user: i64,
        /// Session to resume; defaults to the user's latest session
        #[arg(long)]
        session: Option<String>,
        /// Start a fresh session
        #[arg(long, conflicts_with = "session")]
        new: bool,
    },
    /// Check database health and configuration
    Doctor,
    /// Show catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::PaintwiseConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Search {
            query,
            limit,
            threshold,
            environment,
            finish,
            line,
            color,
            features,
            surfaces,
        } => {
            let filters = ProductFilters {
                environment,
                finish_type: finish,
                product_line: line,
                color,
                features,
                surface_types: surfaces,
            };
            cli::search::search(&config, &query, limit, threshold, filters).await?;
        }
        Command::Backfill { force } => cli::backfill::backfill(&config, force).await?,
        Command::Enrich { force } => cli::enrich::enrich(&config, force).await?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Sessions { user_id, limit } => {
            cli::sessions::sessions(&config, user_id, limit).await?
        }
        Command::Chat { user, session, new } => {
            cli::chat::chat(&config, user, session, new).await?
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}

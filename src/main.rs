//! # MedAssist CLI (`medassist`)
//!
//! ## Usage
//!
//! ```bash
//! medassist --config ./config/medassist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medassist init` | Create the cache database schema |
//! | `medassist ask --type <kind> <message>` | Send one query and print the rendered answer |
//! | `medassist health` | Check that the backend is reachable |
//! | `medassist serve` | Install, activate, and serve assets cache-first |
//! | `medassist cache install` | Install and activate without serving |
//! | `medassist cache list` | Show cache buckets and their entries |
//! | `medassist cache delete <name>` | Delete a cache bucket |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `medassist=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medassist::models::{Query, QueryKind};
use medassist::{cache_cmd, config, dispatcher, migrate, server};

/// MedAssist: ask the health assistant and keep its web UI available offline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "medassist",
    about = "MedAssist: query client and offline asset cache",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medassist.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the cache database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Send one query to the assistant and print the result.
    ///
    /// Prints the rendered HTML, "No response." when the backend had no
    /// answer, or the failure message when the request failed.
    Ask {
        /// Query type.
        #[arg(long = "type", value_enum)]
        kind: QueryKind,

        /// Print the raw Markdown answer instead of HTML.
        #[arg(long)]
        markdown: bool,

        /// The question. Multiple words are joined with spaces; may be empty.
        message: Vec<String>,
    },

    /// Check the backend's `/health` route.
    Health,

    /// Install and activate the asset cache, then serve it cache-first.
    Serve,

    /// Manage the offline asset cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Fetch and store every manifest asset, then remove stale buckets.
    Install,
    /// List cache buckets and their URLs.
    List,
    /// Delete a cache bucket by name.
    Delete {
        /// Bucket name (e.g. `medassist-v1`).
        name: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medassist=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg.cache).await?;
            println!("Cache database initialized at {}.", cfg.cache.db_path.display());
        }
        Commands::Ask {
            kind,
            markdown,
            message,
        } => {
            let query = Query::new(kind, message.join(" "));
            dispatcher::run_ask(&cfg, query, markdown).await?;
        }
        Commands::Health => {
            dispatcher::run_health(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Install => {
                cache_cmd::run_cache_install(&cfg).await?;
            }
            CacheAction::List => {
                cache_cmd::run_cache_list(&cfg).await?;
            }
            CacheAction::Delete { name } => {
                cache_cmd::run_cache_delete(&cfg, &name).await?;
            }
        },
    }

    Ok(())
}

//! Pairsync Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Read from `--config`, else the first of `~/.config/pairsync/config.toml`,
//! `/etc/pairsync/config.toml`, `./config.toml`. Environment variables
//! (`PAIRSYNC_*`) override file values; `RUST_LOG` overrides the log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pairsync::api::{serve, AppState};
use pairsync::config::{generate_default_config, init_logging, Config};
use pairsync::store::{MemoryStore, RoomStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pairsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time pair programming server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP and WebSocket server (default)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print or write the default configuration file
    Config {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { output }) => write_default_config(output),
        Some(Commands::Serve { host, port }) => run_server(cli.config, host, port).await,
        None => run_server(cli.config, None, None).await,
    }
}

fn write_default_config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn run_server(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = Config::resolve(config_path.as_deref())?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    init_logging(&config.logging);

    tracing::info!("Starting Pairsync v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config)?;
    let api_config = config.api_config();
    let state = AppState::with_hub_config(store, api_config.clone(), config.hub_config());

    tracing::info!(
        max_connections = config.hub.max_connections,
        outbound_queue_capacity = config.hub.outbound_queue_capacity,
        "Collaboration hub ready"
    );

    serve(state, &api_config).await?;
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn RoomStore>> {
    if config.storage.in_memory {
        tracing::warn!("Using in-memory store, rooms will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = expand_home(&config.storage.database_path);
    tracing::info!("Database: {}", path.display());

    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::parse_from(["pairsync"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_serve_overrides() {
        let cli = Cli::parse_from(["pairsync", "serve", "--port", "9000", "--config", "p.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("p.toml")));
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            _ => panic!("Expected serve"),
        }
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/db.sqlite"), PathBuf::from("/var/db.sqlite"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x.db"), home.join("x.db"));
        }
    }
}

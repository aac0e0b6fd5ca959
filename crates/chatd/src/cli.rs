//! Command-line entry point for `chatd`.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8080)
//! chatd
//!
//! # Listen elsewhere
//! chatd --listen 127.0.0.1:9000
//! CHATD_LISTEN=127.0.0.1:9000 chatd
//!
//! # Use a config file
//! chatd --config /etc/linechat/chatd.toml
//!
//! # Enable debug logging
//! RUST_LOG=chatd=debug chatd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown, closing every client connection

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ChatdConfig;
use crate::registry::spawn_registry;
use crate::server::ChatServer;

/// linechat daemon - line-oriented TCP chat server
#[derive(Parser, Debug)]
#[command(name = "chatd", version, about)]
pub struct Args {
    /// Address to listen on (overrides config file and CHATD_LISTEN)
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Resolves the final configuration for these arguments.
    pub fn resolve_config(&self) -> Result<ChatdConfig> {
        let mut config =
            ChatdConfig::resolve(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        Ok(config)
    }
}

/// Parses arguments and runs the daemon until shutdown.
pub fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;
    run_daemon(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: ChatdConfig) -> Result<()> {
    init_tracing(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "chatd starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();

    let server = match ChatServer::bind(&config, registry, cancel_token).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Cannot start server");
            return Err(e.into());
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("chatd stopped");
    Ok(())
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the config's `log_filter` is used,
/// falling back to info level for the workspace crates.
fn init_tracing(config: &ChatdConfig) -> Result<()> {
    let filter = match (&config.log_filter, std::env::var_os(EnvFilter::DEFAULT_ENV)) {
        (Some(directives), None) => {
            EnvFilter::try_new(directives).context("Invalid log_filter in config")?
        }
        _ => EnvFilter::from_default_env()
            .add_directive("chatd=info".parse()?)
            .add_directive("chat_core=info".parse()?)
            .add_directive("chat_protocol=info".parse()?),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_listen_flag_parses() {
        let args = Args::try_parse_from(["chatd", "--listen", "127.0.0.1:4000"]).unwrap();
        assert_eq!(args.listen, Some("127.0.0.1:4000".parse().unwrap()));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_invalid_listen_flag_rejected() {
        assert!(Args::try_parse_from(["chatd", "--listen", "nowhere"]).is_err());
    }

    #[test]
    fn test_flag_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"listen = \"127.0.0.1:5000\"\nmax_line_length = 64\n")
            .unwrap();

        let args = Args {
            listen: Some("127.0.0.1:6000".parse().unwrap()),
            config: Some(file.path().to_path_buf()),
        };
        let config = args.resolve_config().unwrap();

        assert_eq!(config.listen, "127.0.0.1:6000".parse().unwrap());
        assert_eq!(config.max_line_length, 64);
    }
}

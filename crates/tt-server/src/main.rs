//! TACK testbed server daemon
//!
//! Serves a TLS echo endpoint presenting a rotating trust assertion, plus a
//! plain-HTTP control endpoint whose `/next` path rotates it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tt_core::config;
use tt_server::launch::shutdown_on_signal;
use tt_server::Testbed;

#[derive(Parser)]
#[command(name = "tt-server")]
#[command(about = "TLS echo server with rotating TACK pins")]
#[command(version)]
struct Args {
    /// PEM certificate chain to serve
    #[arg(short = 'c', long = "cert")]
    cert: Option<PathBuf>,

    /// PEM private key for the certificate
    #[arg(short = 'k', long = "key")]
    key: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// TLS bind address (overrides config)
    #[arg(long)]
    tls_bind: Option<String>,

    /// Control bind address (overrides config)
    #[arg(long)]
    control_bind: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config::load_testbed_config(args.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", args.config))?
        .with_identity(args.cert, args.key);
    if let Some(bind) = args.tls_bind {
        config.tls_bind = bind;
    }
    if let Some(bind) = args.control_bind {
        config.control_bind = bind;
    }

    if config.identity_paths().is_err() {
        Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a certificate (-c) and a private key (-k) are required",
            )
            .exit();
    }

    tracing::info!("TACK testbed server starting...");

    let cancel = CancellationToken::new();

    shutdown_on_signal(cancel.clone());

    let testbed = Testbed::start(&config, cancel).await?;
    testbed.wait().await?;

    tracing::info!("Testbed shutdown complete");
    Ok(())
}

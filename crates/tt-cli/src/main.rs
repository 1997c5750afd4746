//! TACK testbed CLI
//!
//! Single binary for the testbed:
//! - `server`: TLS echo server with rotating pins plus its control endpoint
//! - `client`: probe a server's handshake and print its trust assertion
//! - `rotate`: trigger the next pin generation on a running server

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tack_testbed::commands;
use tack_testbed::output::print_error;
use tt_core::config;

#[derive(Parser)]
#[command(name = "tack-testbed")]
#[command(author, version, about = "TACK pin rotation testbed")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the TLS echo server and its control endpoint
    /// Alias: serve
    #[command(alias = "serve")]
    Server {
        /// PEM certificate chain to serve
        #[arg(short = 'c', long = "cert")]
        cert: Option<PathBuf>,
        /// PEM private key for the certificate
        #[arg(short = 'k', long = "key")]
        key: Option<PathBuf>,
        /// TLS bind address (overrides config)
        #[arg(long)]
        tls_bind: Option<String>,
        /// Control bind address (overrides config)
        #[arg(long)]
        control_bind: Option<String>,
    },

    /// Probe a TLS echo server and print its trust assertion
    Client {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:8443")]
        addr: String,
        /// Name sent in SNI
        #[arg(short = 'n', long, default_value = "localhost")]
        server_name: String,
        /// Also send this message and check the echo
        #[arg(short, long)]
        message: Option<String>,
        /// Print the probe report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a running server to the next pin generation
    /// Alias: next
    #[command(alias = "next")]
    Rotate {
        /// Control server base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        control: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Commands::Server { .. });
    let log_level = match (cli.quiet, cli.verbose, serving) {
        (true, _, _) => "error",
        (false, 0, true) => "info",
        (false, 0, false) => "warn",
        (false, 1, _) => "info",
        (false, 2, _) => "debug",
        (false, _, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Server {
            cert,
            key,
            tls_bind,
            control_bind,
        } => {
            let mut config = config::load_testbed_config(cli.config.as_deref())
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?
                .with_identity(cert, key);
            if let Some(bind) = tls_bind {
                config.tls_bind = bind;
            }
            if let Some(bind) = control_bind {
                config.control_bind = bind;
            }

            if config.identity_paths().is_err() {
                Cli::command()
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "the server needs a certificate (-c) and a private key (-k)",
                    )
                    .exit();
            }

            if let Err(e) = commands::server_command(&config).await {
                print_error(&format!("Server failed: {:#}", e));
                return Err(e);
            }
        }

        Commands::Client {
            addr,
            server_name,
            message,
            json,
        } => {
            commands::client_command(&addr, &server_name, message.as_deref(), json).await?;
        }

        Commands::Rotate { control } => {
            commands::rotate_command(&control).await?;
        }
    }

    Ok(())
}

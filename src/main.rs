//! Cart API
//!
//! Shopping-cart HTTP service built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ CORS → request id → timeout → instrumentation → router
//!                                                       │               │
//!                                                       ▼               ▼
//!                                               ┌──────────────┐  ┌──────────┐
//!                                               │  telemetry   │◀─│ handlers │
//!                                               │ metrics/logs │  │ + cart   │
//!                                               │   /traces    │  └──────────┘
//!                                               └──────┬───────┘
//!                                                      │ batched export
//!                                                      ▼
//!                                               telemetry backend
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use cart_api::config::loader::with_port;
use cart_api::config::validation::validate_config;
use cart_api::config::{self, ConfigError};
use cart_api::lifecycle::{wait_for_termination, Shutdown};
use cart_api::{HttpServer, Telemetry};

const SERVICE_NAME: &str = "cart-api";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
const TELEMETRY_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "cart-api")]
#[command(about = "Shopping cart API with batched telemetry export", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the configured bind address
    #[arg(short, long)]
    port: Option<u16>,

    /// Remote log level (debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.bind_address = with_port(&config.server.bind_address, port);
    }
    if let Some(level) = cli.log_level {
        config.telemetry.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    let telemetry = match Telemetry::initialize(SERVICE_NAME, SERVICE_VERSION, &config.telemetry) {
        Ok(telemetry) => Arc::new(telemetry),
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e}");
            return Err(e.into());
        }
    };

    tracing::info!(
        service = SERVICE_NAME,
        version = SERVICE_VERSION,
        bind_address = %config.server.bind_address,
        endpoint = %config.telemetry.endpoint,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(&config.server, telemetry.clone());
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = wait_for_termination().await;
        tracing::info!(signal = %signal, "Termination signal received");
        trigger.trigger();
    });

    let served = serving.await;

    if let Err(e) = telemetry.shutdown(TELEMETRY_SHUTDOWN_DEADLINE).await {
        eprintln!("Telemetry shutdown incomplete: {e}");
    }

    served??;
    println!("Shutdown complete");
    Ok(())
}

//! Arena server binary.
//!
//! # Usage
//!
//! ```bash
//! # Local development
//! arena
//!
//! # Public, five-round series, 15 s rounds
//! arena --host 0.0.0.0 --port 8082 --best-of 5 --round-timeout-secs 15
//! ```

use std::time::Duration;

use arena::{ArenaServer, ServerConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Rock-paper-scissors game server
#[derive(Parser, Debug)]
#[command(name = "arena")]
#[command(about = "Real-time two-player rock-paper-scissors server")]
#[command(version)]
struct Args {
    /// Interface to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8082)]
    port: u16,

    /// Seconds before missing choices are picked at random
    #[arg(long, default_value_t = 10)]
    round_timeout_secs: u64,

    /// Series length (odd; even values are rounded up)
    #[arg(long, default_value_t = 3)]
    best_of: u32,

    /// Close connections silent for this many seconds (0 disables)
    #[arg(long, default_value_t = 60)]
    idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Arena server starting");

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        round_timeout: Duration::from_secs(args.round_timeout_secs),
        best_of: args.best_of,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
    };

    let server = ArenaServer::builder().config(config).build().await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;

    Ok(())
}

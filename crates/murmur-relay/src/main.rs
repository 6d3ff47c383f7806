//! Murmur relay binary.
//!
//! # Usage
//!
//! ```bash
//! murmur-relay --bind 0.0.0.0:5174
//!
//! RUST_LOG=murmur_relay=debug murmur-relay --max-connections 500
//! ```

use clap::Parser;
use murmur_proto::MAX_PAYLOAD_SIZE;
use murmur_relay::{DEFAULT_BIND_ADDRESS, Relay, RelayConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Murmur relay server
#[derive(Parser, Debug)]
#[command(name = "murmur-relay")]
#[command(about = "Untrusted relay for end-to-end encrypted Murmur rooms")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Largest accepted packet payload in bytes
    #[arg(long, default_value_t = MAX_PAYLOAD_SIZE)]
    max_payload_size: usize,

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

    tracing::info!("Murmur relay starting");

    let config = RelayConfig {
        bind_address: args.bind,
        max_connections: args.max_connections,
        max_payload_size: args.max_payload_size,
    };

    let relay = Relay::bind(config).await?;

    relay.run().await?;

    Ok(())
}

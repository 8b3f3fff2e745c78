//! scrumdeck server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve the rooms described in backlog.json
//! scrumdeck-server --bind 0.0.0.0:8900 --backlog backlog.json
//!
//! # Let facilitators reveal before everyone has voted
//! scrumdeck-server --backlog backlog.json --allow-force-reveal
//! ```

use clap::Parser;
use scrumdeck_server::{RoomDefaults, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Planning-poker room server
#[derive(Parser, Debug)]
#[command(name = "scrumdeck-server")]
#[command(about = "Planning-poker room server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8900")]
    bind: String,

    /// Path to the JSON backlog file (room name -> pending features)
    #[arg(long, default_value = "backlog.json")]
    backlog: String,

    /// URL base for the final-backlog redirect; the room name is appended.
    /// When unset, clients render the final backlog inline.
    #[arg(long)]
    final_backlog_url: Option<String>,

    /// Let facilitators reveal a round before everyone has voted
    #[arg(long)]
    allow_force_reveal: bool,

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

    tracing::info!("scrumdeck server starting");

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        backlog_path: args.backlog,
        rooms: RoomDefaults {
            allow_force_reveal: args.allow_force_reveal,
            final_backlog_url_base: args.final_backlog_url,
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

//! Bingo relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port
//! bingo-server --bind 0.0.0.0:8080
//!
//! # Small rooms, hand host to the newest member
//! bingo-server --default-capacity 10 --max-capacity 20 --host-selection latest-joined
//! ```

use std::time::Duration;

use bingo_server::{DriverConfig, HostSelection, Server, ServerRuntimeConfig};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Who inherits the host role when the host leaves
#[derive(Debug, Clone, Copy, ValueEnum)]
enum HostSelectionArg {
    /// Member who has been in the room longest
    EarliestJoined,
    /// Member who joined most recently
    LatestJoined,
}

impl From<HostSelectionArg> for HostSelection {
    fn from(arg: HostSelectionArg) -> Self {
        match arg {
            HostSelectionArg::EarliestJoined => Self::EarliestJoined,
            HostSelectionArg::LatestJoined => Self::LatestJoined,
        }
    }
}

/// Multiplayer bingo room relay
#[derive(Parser, Debug)]
#[command(name = "bingo-server")]
#[command(about = "WebSocket relay for multiplayer bingo rooms")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Room capacity when the creator does not ask for one
    #[arg(long, default_value = "100")]
    default_capacity: usize,

    /// Largest room capacity a creator may ask for
    #[arg(long, default_value = "100")]
    max_capacity: usize,

    /// Seconds a closed connection is remembered before it is reaped
    #[arg(long, default_value = "30")]
    reap_grace_secs: u64,

    /// Seconds after which an empty room is swept
    #[arg(long, default_value = "600")]
    room_max_age_secs: u64,

    /// Host hand-off rule
    #[arg(long, value_enum, default_value = "earliest-joined")]
    host_selection: HostSelectionArg,

    /// Milliseconds between maintenance ticks
    #[arg(long, default_value = "1000")]
    tick_millis: u64,

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

    tracing::info!("Bingo server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        tick_interval: Duration::from_millis(args.tick_millis),
        driver: DriverConfig {
            max_connections: args.max_connections,
            default_capacity: args.default_capacity,
            max_capacity: args.max_capacity,
            reap_grace: Duration::from_secs(args.reap_grace_secs),
            room_max_age: Duration::from_secs(args.room_max_age_secs),
            host_selection: args.host_selection.into(),
        },
        ..Default::default()
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

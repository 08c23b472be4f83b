//! Athena server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve with the bundled configuration
//! athena-server --config config/config.toml
//!
//! # Override the listen ports and enable debug logging
//! athena-server --config config/config.toml --port 27016 --ws-port 27017 --log-level debug
//! ```

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use athena_server::{Config, MemoryStorage, RedbStorage, Server, Storage, SystemEnv, VERSION, transport};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Athena courtroom server
#[derive(Parser, Debug)]
#[command(name = "athena-server")]
#[command(about = "Attorney Online compatible session server")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Address to bind to, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,

    /// TCP port, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// WebSocket port, overriding the configuration
    #[arg(long)]
    ws_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.ws_port.is_some() {
        config.server.ws_port = args.ws_port;
    }

    tracing::info!("Athena {VERSION} starting as {}", config.server.name);

    let storage: Arc<dyn Storage> = match &config.server.database_path {
        Some(path) => {
            tracing::info!("Opening database {}", path.display());
            Arc::new(RedbStorage::open(path)?)
        },
        None => {
            tracing::warn!("No database_path configured, bans and accounts will not persist");
            Arc::new(MemoryStorage::new())
        },
    };

    let tcp_addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let ws_addr = config.server.ws_port.map(|port| format!("{}:{port}", config.server.bind_address));
    let (server, mut fatal) = Server::new(config, SystemEnv::new(), storage);

    transport::listen_tcp(&server, &tcp_addr).await?;
    if let Some(ws_addr) = ws_addr {
        transport::listen_ws(&server, &ws_addr).await?;
    }

    tokio::select! {
        err = fatal.recv() => match err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        },
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutting down");
            Ok(())
        },
    }
}

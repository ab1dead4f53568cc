use anyhow::Result;
use clap::Parser;
use lnbridge_protocol::Message;
use lnbridge_routing::Mode;
use lnbridge_transport::LoopbackTransport;
use lnbridged::config::LoggingConfig;
use lnbridged::{Config, GatewayNode};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lnbridged")]
#[command(about = "Gateway between a control bus and a publish/subscribe broker")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "LNBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Write a default configuration file and start with it
    #[arg(long)]
    init: bool,

    /// Override the configured mode (local-only, broker-only, gateway)
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.init {
        Config::create_default(args.config)?
    } else {
        Config::load(args.config)?
    };
    if let Some(mode) = args.mode {
        config.gateway.mode = mode;
    }

    init_logging(&config.logging, args.debug);

    info!("Starting lnbridged");
    info!("Configuration: {}", config.config_path().display());

    // Hardware drivers attach through BusTransport; none are linked here.
    warn!("Running on loop-back transports");
    let control_bus = LoopbackTransport::control_bus(config.runtime.queue_capacity);
    let broker = LoopbackTransport::broker(config.runtime.queue_capacity);

    let mut node = GatewayNode::new(
        &config,
        Box::new(control_bus),
        Box::new(broker),
        |message: Message| {
            info!(
                request_id = %message.request_id(),
                payload = %hex::encode(&message.payload),
                "application message"
            );
        },
    )?;

    node.run().await
}

fn init_logging(logging: &LoggingConfig, debug: bool) {
    let level = if debug { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

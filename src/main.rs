//! beacond - Main Entry Point
//!
//! Startup sequence: configuration, logging, link bring-up (the one place
//! the process may stall forever), session handshake, then the dispatch
//! loop, which never returns.

use beacond::config::DeviceConfig;
use beacond::dispatch::Dispatcher;
use beacond::error::DeviceError;
use beacond::net::{NetworkConnector, NetworkError, TcpLinkProbe};
use beacond::observability::init_default_logging;
use beacond::session::{InboundFrame, MqttTransport, SessionClient, SessionError};
use beacond::trigger::spawn_signal_trigger;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Single-device telemetry client
#[derive(Parser)]
#[command(name = "beacond")]
#[command(about = "Single-device MQTT telemetry client")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the telemetry client
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("starting beacond v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_device(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("loading configuration from: {}", path.display());
            Ok(DeviceConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["beacond.toml", "config/beacond.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("loading configuration from: {}", path.display());
                    return Ok(DeviceConfig::load_from_file(&path)?);
                }
            }

            error!("no configuration file found; provide one with -c/--config or create beacond.toml");
            process::exit(1);
        }
    }
}

async fn run_device(config: DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(device_id = %config.device.id, "device starting");

    info!("opening network interface");
    let mut iface = match TcpLinkProbe::detect(&config.broker) {
        Some(iface) => iface,
        None => {
            error!("unable to open network interface");
            return Err(DeviceError::from(NetworkError::NoInterface).into());
        }
    };

    // The one sanctioned indefinite stall: link bring-up retries forever,
    // before the dispatch loop begins.
    let link = Arc::new(NetworkConnector::connect(&mut iface));

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<InboundFrame>();
    let mut transport = MqttTransport::new(&config.device.id, &config.broker)?;
    transport.set_frame_sender(frame_tx);

    let mut session = SessionClient::new(transport, link, config.device.id.clone());
    session.set_inbound_handler(|payload| {
        info!(message = %String::from_utf8_lossy(payload.bytes()), "message arrived");
    });

    let code = session.connect().await?;
    if !code.is_success() {
        if config.session.strict_handshake {
            error!(code = code.value(), "broker rejected handshake, refusing to start");
            return Err(DeviceError::from(SessionError::Rejected(code)).into());
        }
        // Lenient mode: log the code and carry on. Publishes surface their
        // own failures.
        warn!(code = code.value(), "broker answered handshake with non-success code, continuing");
    }

    let (dispatcher, handle) = Dispatcher::new(session);

    // Inbound frames reach the session only through the dispatcher, so they
    // serialize with publish tasks.
    let inbound_handle = handle.clone();
    tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let posted = inbound_handle.post(Box::new(move |mut session: SessionClient<MqttTransport>| {
                Box::pin(async move {
                    session.handle_inbound(frame);
                    (session, Ok(()))
                })
            }));
            if posted.is_err() {
                break;
            }
        }
    });

    spawn_signal_trigger(handle)?;

    // Never returns in normal operation; the trigger and inbound bridges
    // hold dispatch handles for the life of the process.
    dispatcher.dispatch_forever().await;
    Ok(())
}

fn handle_config_command(config: DeviceConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("configuration validation complete");
    Ok(())
}

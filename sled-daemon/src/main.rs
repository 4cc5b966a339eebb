use std::path::PathBuf;

use clap::Parser;
use sled_core::{
    common::{node_id::InvalidNodeIdError, NodeId},
    config::ConfigError,
    machines::interface::InterfaceState,
    Sled, SledConfig, SledError, SocketCanDriver,
};
use snafu::{ResultExt, Snafu};
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(version, about = "Runs the sled control stack on a socketcan adapter")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// CAN adapter to use, e.g. can0. Overrides the configuration.
    #[clap(long)]
    can_device: Option<String>,
    /// Node ID of the drive. Overrides the configuration.
    #[clap(long, short)]
    node_id: Option<u8>,
}

#[derive(Debug, Snafu)]
enum DaemonError {
    #[snafu(display("{source}"))]
    Config { source: ConfigError },
    #[snafu(display("{source}"))]
    NodeId { source: InvalidNodeIdError },
    #[snafu(display("Failed to set up sled: {source}"))]
    Setup { source: SledError },
}

fn load_config(args: &Args) -> Result<SledConfig, DaemonError> {
    let mut config = match &args.config {
        Some(path) => SledConfig::load(path).context(ConfigSnafu)?,
        None => SledConfig::default(),
    };
    if let Some(device) = &args.can_device {
        config.can_device = device.clone();
    }
    if let Some(id) = args.node_id {
        config.node_id = NodeId::new(id).context(NodeIdSnafu)?;
    }
    Ok(config)
}

async fn run(args: Args) -> Result<(), DaemonError> {
    let config = load_config(&args)?;
    log::info!(
        "Controlling node {} on {}",
        config.node_id,
        config.can_device
    );

    let driver = SocketCanDriver::new(config.can_device.clone());
    let mut sled = Sled::new(&config, driver).context(SetupSnafu)?;
    sled.open();

    let epoch = Instant::now();
    let now_us = || epoch.elapsed().as_micros() as u64;

    let mut poll = interval(Duration::from_millis(1));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let period = Duration::from_millis(config.watchdog.period_ms as u64);
    let mut watchdog = interval_at(Instant::now() + period, period);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                sled.process_frames(now_us());
            }
            _ = watchdog.tick() => {
                if sled.interface_state() == InterfaceState::Closed {
                    log::info!("Reopening {}", config.can_device);
                    sled.open();
                }
                sled.check_watchdog(now_us());
            }
            _ = &mut ctrl_c => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    sled.close();
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

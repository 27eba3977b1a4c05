use std::path::PathBuf;

use anyhow::Context as _;
use chrono::TimeDelta;
use clap::Parser;
use log::{LevelFilter, info};

mod config;
mod manager;
mod messages;
mod mqtt;
mod notify;
mod presence;
mod scanner;
mod simulation;

/// Monitor wifi networks and send ntfy.sh notifications.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Run in simulation mode using fake nmcli output
    #[arg(long)]
    simulate: bool,

    /// Target SSIDs to monitor, overriding the config file
    #[arg(long, num_args = 1..)]
    targets: Option<Vec<String>>,

    /// Set the log level to debug
    #[arg(long)]
    debug: bool,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn init_logging(debug: bool) {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let app_config = config::AppConfig::load(&args.config)?;
    let settings = app_config.resolve(args.simulate, args.targets)?;
    info!("Monitoring {:?}", settings.targets);

    let mut notifiers: Vec<Box<dyn notify::Notifier>> = vec![Box::new(
        notify::NtfyNotifier::new(&settings.ntfy, settings.simulate),
    )];

    if let Some(mqtt_config) = &app_config.mqtt {
        let (mqtt_notifier, mut eventloop) = mqtt::MqttNotifier::new(mqtt_config);
        tokio::task::spawn(async move {
            mqtt::MqttNotifier::event_loop(&mut eventloop).await;
        });
        notifiers.push(Box::new(mqtt_notifier));
    }

    let offline_threshold = TimeDelta::from_std(settings.offline_threshold)
        .context("offline threshold is out of range")?;
    let tracker = presence::PresenceTracker::new(settings.targets.clone(), offline_threshold);
    let manager_settings = manager::ManagerSettings {
        scan_interval: settings.scan_interval,
        scan_timeout: settings.scan_timeout,
        notify_timeout: settings.notify_timeout,
    };

    if settings.simulate {
        let scanner = simulation::SimulatedScanner::new(&settings.targets);
        manager::Manager::new(scanner, notifiers, tracker, manager_settings)
            .run_loop()
            .await?;
        info!("Simulation completed.");
    } else {
        let scanner = scanner::NmcliScanner::new(settings.nmcli_path.clone());
        manager::Manager::new(scanner, notifiers, tracker, manager_settings)
            .run_loop()
            .await?;
    }

    Ok(())
}

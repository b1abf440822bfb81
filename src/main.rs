pub mod agent;
pub mod config;
pub mod mqtt;
pub mod net;
pub mod publisher;
pub mod sensor;

#[cfg(test)]
mod testing;

use crate::agent::{Agent, AgentError};
use crate::config::{AgentConfig, ProbeConfig};
use crate::mqtt::MqttSession;
use crate::net::link::{check_link, SYSFS_NET};
use crate::net::{DnsResolver, EventQueue};
use crate::sensor::BoardSensors;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AgentConfig::load(config_path.as_deref()).await?;
    setup_logging_env(config.logging.max_level()?);

    info!("=== rackwatch starting ===");
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }
    info!("Broker: {}", config.broker);

    match config.network.link_interface() {
        Some(interface) => check_link(Path::new(SYSFS_NET), interface)?,
        None => info!("No network interface configured, skipping link check"),
    }

    let sensors = setup_sensors(&config)?;

    let events = EventQueue::new();
    let resolver = DnsResolver::new(events.sender());
    let session = MqttSession::new(events.sender());

    let agent = Agent::create(
        &config,
        Box::new(sensors),
        Box::new(resolver),
        Box::new(session),
        events,
    );
    let agent = agent.boot()?;

    agent.run().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn setup_sensors(config: &AgentConfig) -> Result<BoardSensors, AgentError> {
    let mut sensors = BoardSensors::new(config.sensors.thermal_path.clone());

    for channel in &config.channels {
        if let ProbeConfig::Contact { pin, active_low } = channel.probe {
            sensors.configure_contact(pin, active_low)?;
        }
    }

    Ok(sensors)
}

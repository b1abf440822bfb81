//! Connection orchestrator
//!
//! Drives the one-shot startup sequence from broker name to broker session:
//!
//! ```text
//! start() ──► resolve ──┬─ Cached ──────────────┐
//!                       └─ Pending ─► Resolved ─┴─► on_resolved() ──► connect
//!                                                                        │
//!                         ConnectionState ◄── on_status() ◄── Status ◄───┘
//! ```
//!
//! The orchestrator is the only writer of the broker address and of the
//! connection state. Nothing here retries: a failed lookup or a refused or
//! dropped connection leaves the agent disconnected until it is restarted.

use std::net::IpAddr;
use tracing::{error, info, warn};

use super::events::NetEvent;
use super::resolver::{NameResolver, Resolution, ResolveError};
use crate::mqtt::{BrokerSession, ClientConfig, ConnectStatus, ConnectionState, MqttConfig};

pub struct Orchestrator {
    host: String,
    port: u16,
    client: ClientConfig,
    broker_address: Option<IpAddr>,
    state: ConnectionState,
}

impl Orchestrator {
    pub fn new(config: &MqttConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            client: config.client_config(),
            broker_address: None,
            state: ConnectionState::default(),
        }
    }

    /// Fires the broker lookup. A lookup that fails immediately is fatal.
    pub fn start(
        &mut self,
        resolver: &mut dyn NameResolver,
        session: &mut dyn BrokerSession,
    ) -> Result<(), ResolveError> {
        info!("Resolving broker host {}", self.host);

        match resolver.resolve(&self.host) {
            Ok(Resolution::Cached(address)) => {
                let host = self.host.clone();
                self.on_resolved(&host, Some(address), session);
            }
            Ok(Resolution::Pending) => {
                info!("Lookup for {} in progress", self.host);
            }
            Err(e) => {
                error!("Failed to resolve {}: {}", self.host, e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stores the broker address and issues the single connect attempt.
    pub fn on_resolved(
        &mut self,
        name: &str,
        address: Option<IpAddr>,
        session: &mut dyn BrokerSession,
    ) {
        let Some(address) = address else {
            error!("Failed to resolve {}, staying disconnected", name);
            return;
        };

        if let Some(known) = self.broker_address {
            warn!(
                "Ignoring repeated resolution {} -> {}, broker already at {}",
                name, address, known
            );
            return;
        }

        info!("Resolved {} -> {}", name, address);
        self.broker_address = Some(address);

        if let Err(e) = session.connect(address, self.port, &self.client) {
            error!("Failed to start broker connection: {}", e);
        }
    }

    pub fn on_status(&mut self, status: &ConnectStatus) {
        self.state = match status {
            ConnectStatus::Accepted => {
                info!("Connected to broker");
                ConnectionState::Connected
            }
            ConnectStatus::Refused(code) => {
                error!("Broker refused connection: {:?}", code);
                ConnectionState::Disconnected
            }
            ConnectStatus::Lost(reason) => {
                error!("Broker connection lost: {}", reason);
                ConnectionState::Disconnected
            }
        };
    }

    pub fn handle(&mut self, event: NetEvent, session: &mut dyn BrokerSession) {
        match event {
            NetEvent::Resolved { host, address } => self.on_resolved(&host, address, session),
            NetEvent::Status(status) => self.on_status(&status),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn broker_address(&self) -> Option<IpAddr> {
        self.broker_address
    }
}

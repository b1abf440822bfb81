//! Agent - the main poll loop
//!
//! Two-state lifecycle with compile-time state safety via statum:
//!
//! ```text
//! Booting ──boot()──► Running ──► tick ─► sleep ─► tick ─► ...
//! ```
//!
//! `boot()` fires the broker lookup; a lookup that fails immediately aborts
//! startup. Each tick in `Running` does, in order:
//!
//! 1. service the network: drain queued lookup/broker completions into the
//!    orchestrator
//! 2. sample every channel and let the publisher decide what to send
//! 3. sleep the poll interval (done by [`Agent::run`])
//!
//! Everything runs on one thread. Background I/O only makes progress while
//! the loop sleeps, and its results are applied in step 1 of the next tick,
//! never in the middle of step 2.

use chrono::{DateTime, Local};
use statum::{machine, state};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::AgentConfig;
use crate::mqtt::{BrokerSession, ConnectionState};
use crate::net::link::LinkError;
use crate::net::{EventQueue, NameResolver, Orchestrator, ResolveError};
use crate::publisher::{Evaluation, PublishStats, Publisher};
use crate::sensor::{SensorError, SensorSource};

/// How often the publish counters are logged
const STATS_LOG_INTERVAL_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Broker resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

#[state]
#[derive(Debug, Clone)]
pub enum AgentState {
    Booting,
    Running,
}

#[machine]
pub struct Agent<S: AgentState> {
    sensors: Box<dyn SensorSource>,
    resolver: Box<dyn NameResolver>,
    session: Box<dyn BrokerSession>,
    events: EventQueue,
    orchestrator: Orchestrator,
    publisher: Publisher,
    interval: Duration,
    last_stats_log: DateTime<Local>,
}

impl<S: AgentState> Agent<S> {
    pub fn connection_state(&self) -> &ConnectionState {
        self.orchestrator.state()
    }

    pub fn stats(&self) -> &PublishStats {
        self.publisher.stats()
    }
}

impl Agent<Booting> {
    /// Wires collaborators and builds the channels from `config`.
    ///
    /// `events` must be the queue the resolver and the session report into.
    pub fn create(
        config: &AgentConfig,
        sensors: Box<dyn SensorSource>,
        resolver: Box<dyn NameResolver>,
        session: Box<dyn BrokerSession>,
        events: EventQueue,
    ) -> Self {
        let channels = config.build_channels();
        for channel in &channels {
            info!("Monitoring {} on {}", channel.name(), channel.topic());
        }

        Self::new(
            sensors,
            resolver,
            session,
            events,
            Orchestrator::new(&config.broker),
            Publisher::new(channels, config.poll.change_policy),
            config.poll.interval(),
            Local::now(),
        )
    }

    /// Starts the broker lookup and transitions to `Running`.
    pub fn boot(mut self) -> Result<Agent<Running>, AgentError> {
        self.orchestrator
            .start(self.resolver.as_mut(), self.session.as_mut())?;

        info!("Agent booted, entering poll loop");
        Ok(self.transition())
    }
}

impl Agent<Running> {
    /// Applies every completion queued since the last tick.
    pub fn service_network(&mut self) {
        for event in self.events.drain() {
            debug!("Handling network event: {:?}", event);
            self.orchestrator.handle(event, self.session.as_mut());
        }
    }

    /// One poll iteration without the trailing sleep.
    pub fn tick(&mut self) -> Vec<Evaluation> {
        self.service_network();

        let state = self.orchestrator.state().clone();
        self.publisher
            .run_cycle(self.sensors.as_mut(), &state, self.session.as_mut())
    }

    /// Polls forever.
    pub async fn run(mut self) {
        info!("Starting poll loop with {:?} interval", self.interval);

        loop {
            let evaluations = self.tick();
            if evaluations.contains(&Evaluation::PublishFailed) {
                error!("Publish failures this tick, readings will not be resent");
            }

            let now = Local::now();
            if now - self.last_stats_log > chrono::Duration::seconds(STATS_LOG_INTERVAL_SECS) {
                info!(
                    "Publisher stats ({:?}, broker {:?}): {}",
                    self.connection_state(),
                    self.orchestrator.broker_address(),
                    self.stats()
                );
                self.last_stats_log = now;
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

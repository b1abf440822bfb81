//! Change-detection publisher
//!
//! Every channel keeps the last value it managed to hand to the broker. A new
//! sample is only published when it differs from that cache:
//!
//! ```text
//! sample ──► differs? ──no──► Unchanged
//!               │yes
//!               ▼
//!           connected? ──no──► Dropped        (cache untouched)
//!               │yes
//!               ▼
//!            publish ───────► Published / PublishFailed (cache updated)
//! ```
//!
//! Delivery is best effort and at most once. A reading observed while
//! disconnected is not queued; since the cache keeps its old value the same
//! change is picked up again on a later tick.

use chrono::{DateTime, Local};
use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::mqtt::{BrokerSession, ConnectionState, Topic};
use crate::sensor::{Reading, SensorError, SensorSource, TemperatureUnit};

/// Initial cache value of a scalar channel, outside any plausible reading
pub const SCALAR_SENTINEL: f32 = -1.0;

/// How a sample is compared against the cached value.
///
/// `Exact` compares raw readings, so a scalar publishes on any change of its
/// float value, including changes invisible in the two-decimal payload.
/// `Rendered` compares payloads instead and only publishes when the text sent
/// to the broker would change.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangePolicy {
    #[default]
    Exact,
    Rendered,
}

impl ChangePolicy {
    pub fn differs(self, cached: Option<&Reading>, current: &Reading) -> bool {
        match cached {
            None => true,
            Some(cached) => match self {
                ChangePolicy::Exact => cached != current,
                ChangePolicy::Rendered => cached.payload() != current.payload(),
            },
        }
    }
}

/// Which physical input a channel samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probe {
    Contact { pin: u8 },
    Temperature { unit: TemperatureUnit },
}

impl Probe {
    /// Cache value forcing the first publish of a channel
    pub fn sentinel(&self) -> Reading {
        match self {
            Probe::Contact { .. } => Reading::Contact(false),
            Probe::Temperature { .. } => Reading::Scalar(SCALAR_SENTINEL),
        }
    }
}

/// Result of evaluating one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Unchanged,
    Dropped,
    Published,
    PublishFailed,
}

pub struct Channel {
    name: String,
    probe: Probe,
    topic: Topic,
    last_value: Option<Reading>,
}

impl Channel {
    /// `last_value` of `None` means unset, so any first reading is published.
    pub fn new(name: impl Into<String>, probe: Probe, topic: Topic, last_value: Option<Reading>) -> Self {
        Self {
            name: name.into(),
            probe,
            topic,
            last_value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn last_value(&self) -> Option<Reading> {
        self.last_value
    }

    pub fn poll(&self, source: &mut dyn SensorSource) -> Result<Reading, SensorError> {
        match self.probe {
            Probe::Contact { pin } => source.read_digital(pin).map(Reading::Contact),
            Probe::Temperature { unit } => source.read_scalar(unit).map(Reading::Scalar),
        }
    }

    pub fn evaluate(
        &mut self,
        current: Reading,
        policy: ChangePolicy,
        state: &ConnectionState,
        session: &mut dyn BrokerSession,
    ) -> Evaluation {
        if !policy.differs(self.last_value.as_ref(), &current) {
            return Evaluation::Unchanged;
        }

        let payload = current.payload();
        info!("{} changed to {}", self.name, payload);

        if *state != ConnectionState::Connected {
            warn!("Not connected, not publishing {}", self.name);
            return Evaluation::Dropped;
        }

        info!("Publishing '{}' to {}", payload, self.topic);
        let result = session.publish(
            self.topic.as_str(),
            payload.as_bytes(),
            QoS::AtMostOnce,
            false,
        );
        self.last_value = Some(current);

        match result {
            Ok(()) => {
                debug!("Publish of {} handed to session", self.name);
                Evaluation::Published
            }
            Err(e) => {
                error!("Failed to publish to {}: {}", self.topic, e);
                Evaluation::PublishFailed
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PublishStats {
    pub published: usize,
    pub failed: usize,
    pub dropped: usize,
    pub last_publish: Option<DateTime<Local>>,
}

impl PublishStats {
    fn record(&mut self, evaluation: Evaluation) {
        match evaluation {
            Evaluation::Unchanged => {}
            Evaluation::Dropped => self.dropped += 1,
            Evaluation::Published => {
                self.published += 1;
                self.last_publish = Some(Local::now());
            }
            Evaluation::PublishFailed => {
                self.failed += 1;
                self.last_publish = Some(Local::now());
            }
        }
    }
}

impl fmt::Display for PublishStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "published={} failed={} dropped={}",
            self.published, self.failed, self.dropped
        )?;
        match self.last_publish {
            Some(at) => write!(f, " last={}", at.format("%H:%M:%S")),
            None => write!(f, " last=never"),
        }
    }
}

/// Owns every channel and their caches; the only writer of `last_value`.
pub struct Publisher {
    channels: Vec<Channel>,
    policy: ChangePolicy,
    stats: PublishStats,
}

impl Publisher {
    pub fn new(channels: Vec<Channel>, policy: ChangePolicy) -> Self {
        Self {
            channels,
            policy,
            stats: PublishStats::default(),
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    /// Samples every channel once and evaluates the result.
    ///
    /// A channel whose read fails is skipped for this cycle and keeps its cache.
    pub fn run_cycle(
        &mut self,
        source: &mut dyn SensorSource,
        state: &ConnectionState,
        session: &mut dyn BrokerSession,
    ) -> Vec<Evaluation> {
        let mut evaluations = Vec::with_capacity(self.channels.len());

        for channel in &mut self.channels {
            let current = match channel.poll(source) {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("Failed to sample {}: {}", channel.name, e);
                    continue;
                }
            };

            let evaluation = channel.evaluate(current, self.policy, state, session);
            self.stats.record(evaluation);
            evaluations.push(evaluation);
        }

        evaluations
    }
}

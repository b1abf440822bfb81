//! Scripted stand-ins for the hardware and network collaborators.

use rumqttc::QoS;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::rc::Rc;

use crate::mqtt::session::SessionError;
use crate::mqtt::{BrokerSession, ClientConfig};
use crate::net::resolver::{NameResolver, Resolution, ResolveError};
use crate::sensor::{SensorError, SensorSource, TemperatureUnit};

/// Sensor source replaying fixed sequences, one value per read.
#[derive(Default)]
pub struct ScriptedSensors {
    contacts: HashMap<u8, VecDeque<bool>>,
    temperatures: VecDeque<f32>,
}

impl ScriptedSensors {
    pub fn with_contact(mut self, pin: u8, samples: &[bool]) -> Self {
        self.contacts.insert(pin, samples.iter().copied().collect());
        self
    }

    pub fn with_temperatures(mut self, samples: &[f32]) -> Self {
        self.temperatures = samples.iter().copied().collect();
        self
    }
}

impl SensorSource for ScriptedSensors {
    fn read_digital(&mut self, pin: u8) -> Result<bool, SensorError> {
        self.contacts
            .get_mut(&pin)
            .and_then(|samples| samples.pop_front())
            .ok_or(SensorError::UnconfiguredPin(pin))
    }

    fn read_scalar(&mut self, _unit: TemperatureUnit) -> Result<f32, SensorError> {
        self.temperatures
            .pop_front()
            .ok_or_else(|| SensorError::TemperatureRead("script exhausted".to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FakeAnswer {
    Cached(IpAddr),
    Pending,
    Fail,
}

/// Resolver answering every request the same way and remembering the hosts.
pub struct FakeResolver {
    answer: FakeAnswer,
    pub requests: Rc<RefCell<Vec<String>>>,
}

impl FakeResolver {
    pub fn new(answer: FakeAnswer) -> Self {
        Self {
            answer,
            requests: Rc::default(),
        }
    }
}

impl NameResolver for FakeResolver {
    fn resolve(&mut self, host: &str) -> Result<Resolution, ResolveError> {
        self.requests.borrow_mut().push(host.to_string());
        match self.answer {
            FakeAnswer::Cached(address) => Ok(Resolution::Cached(address)),
            FakeAnswer::Pending => Ok(Resolution::Pending),
            FakeAnswer::Fail => Err(ResolveError::InvalidHost(host.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Connect {
        address: IpAddr,
        port: u16,
        config: ClientConfig,
    },
    Publish {
        topic: String,
        payload: String,
        qos: QoS,
        retain: bool,
    },
}

pub type SessionLog = Rc<RefCell<Vec<SessionCall>>>;

/// Session that records every call into a shared log.
#[derive(Default)]
pub struct RecordingSession {
    pub log: SessionLog,
    pub fail_publish: bool,
}

impl RecordingSession {
    pub fn publishes(&self) -> Vec<(String, String)> {
        publishes(&self.log)
    }
}

pub fn publishes(log: &SessionLog) -> Vec<(String, String)> {
    log.borrow()
        .iter()
        .filter_map(|call| match call {
            SessionCall::Publish { topic, payload, .. } => Some((topic.clone(), payload.clone())),
            _ => None,
        })
        .collect()
}

impl BrokerSession for RecordingSession {
    fn connect(
        &mut self,
        address: IpAddr,
        port: u16,
        config: &ClientConfig,
    ) -> Result<(), SessionError> {
        self.log.borrow_mut().push(SessionCall::Connect {
            address,
            port,
            config: config.clone(),
        });
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), SessionError> {
        self.log.borrow_mut().push(SessionCall::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        if self.fail_publish {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }
}

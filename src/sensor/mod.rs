//! Sensor access for the monitored rack
//!
//! The agent only ever needs two primitives from the hardware: the state of a
//! digital contact and one calibrated scalar. Both sit behind [`SensorSource`]
//! so the poll loop can be driven by real GPIO or by a scripted source in tests.
//!
//! ```text
//! GPIO pin ──────┐
//!                ├──► SensorSource ──► Reading ──► Publisher
//! thermal zone ──┘
//! ```

pub mod board;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use board::BoardSensors;

/// A single sampled value from one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Normalized contact state, `true` means active (door open / button pressed)
    Contact(bool),
    /// Calibrated scalar measurement
    Scalar(f32),
}

impl Reading {
    /// Renders the reading as the ASCII payload sent on the wire.
    ///
    /// Contacts become `ON`/`OFF`, scalars keep exactly two fractional digits.
    pub fn payload(&self) -> String {
        match self {
            Reading::Contact(true) => "ON".to_string(),
            Reading::Contact(false) => "OFF".to_string(),
            Reading::Scalar(value) => format!("{:.2}", value),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.payload())
    }
}

/// Unit selector for the temperature channel.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Converts a Celsius value into this unit.
    pub fn from_celsius(self, celsius: f32) -> f32 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

// Sensor errors
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("GPIO unavailable: {0}")]
    GpioUnavailable(String),

    #[error("Pin {0} was not configured as input")]
    UnconfiguredPin(u8),

    #[error("Failed to read temperature: {0}")]
    TemperatureRead(String),
}

/// Poll-style access to the physical inputs.
///
/// Implementations own debouncing, pull resistors and active-level
/// normalization; callers only see the logical state.
pub trait SensorSource {
    /// Returns `true` when the contact on `pin` is in its active state.
    fn read_digital(&mut self, pin: u8) -> Result<bool, SensorError>;

    /// Returns the onboard temperature converted to `unit`.
    fn read_scalar(&mut self, unit: TemperatureUnit) -> Result<f32, SensorError>;
}

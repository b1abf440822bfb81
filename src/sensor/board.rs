//! Raspberry Pi backed sensor source
//!
//! Contacts are read through `rppal` GPIO input pins, the temperature comes from
//! the kernel thermal zone which reports millidegrees Celsius.

use super::{SensorError, SensorSource, TemperatureUnit};
use rppal::gpio::{Gpio, InputPin};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default location of the SoC temperature on Raspberry Pi OS
pub const DEFAULT_THERMAL_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

struct ContactPin {
    pin: InputPin,
    active_low: bool,
}

pub struct BoardSensors {
    gpio: Option<Gpio>,
    contacts: HashMap<u8, ContactPin>,
    thermal_path: PathBuf,
}

impl BoardSensors {
    pub fn new(thermal_path: impl Into<PathBuf>) -> Self {
        Self {
            gpio: None,
            contacts: HashMap::new(),
            thermal_path: thermal_path.into(),
        }
    }

    /// Claims `pin` as an input. Active-low contacts get the internal pull-up
    /// so an open contact reads high and a closed one reads low.
    pub fn configure_contact(&mut self, pin: u8, active_low: bool) -> Result<(), SensorError> {
        if self.gpio.is_none() {
            info!("Initializing GPIO access");
            let gpio = Gpio::new().map_err(|e| SensorError::GpioUnavailable(e.to_string()))?;
            self.gpio = Some(gpio);
        }

        let gpio = self
            .gpio
            .as_ref()
            .ok_or_else(|| SensorError::GpioUnavailable("GPIO not initialized".to_string()))?;
        let raw = gpio
            .get(pin)
            .map_err(|e| SensorError::GpioUnavailable(format!("pin {}: {}", pin, e)))?;

        let input = if active_low {
            raw.into_input_pullup()
        } else {
            raw.into_input_pulldown()
        };

        debug!("Configured pin {} as input (active_low={})", pin, active_low);
        self.contacts.insert(
            pin,
            ContactPin {
                pin: input,
                active_low,
            },
        );
        Ok(())
    }
}

impl SensorSource for BoardSensors {
    fn read_digital(&mut self, pin: u8) -> Result<bool, SensorError> {
        let contact = self
            .contacts
            .get(&pin)
            .ok_or(SensorError::UnconfiguredPin(pin))?;

        // Pull-up wiring inverts the level
        Ok(if contact.active_low {
            contact.pin.is_low()
        } else {
            contact.pin.is_high()
        })
    }

    fn read_scalar(&mut self, unit: TemperatureUnit) -> Result<f32, SensorError> {
        let raw = std::fs::read_to_string(&self.thermal_path).map_err(|e| {
            SensorError::TemperatureRead(format!("{}: {}", self.thermal_path.display(), e))
        })?;
        let celsius = parse_millidegrees(&raw)?;
        Ok(unit.from_celsius(celsius))
    }
}

fn parse_millidegrees(raw: &str) -> Result<f32, SensorError> {
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|e| SensorError::TemperatureRead(format!("invalid value '{}': {}", raw.trim(), e)))?;
    Ok(millis as f32 / 1000.0)
}

//! Thermostat setpoints
//!
//! The controller exposes two writable temperature targets, each stored in
//! a holding register in tenths of a degree.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::snapshot::Snapshot;

/// Rejected setpoint request
#[derive(Debug, Error, PartialEq)]
pub enum SetpointError {
    #[error("{setpoint} must be between {min} and {max} °C, got {celsius}")]
    OutOfRange {
        setpoint: Setpoint,
        celsius: f64,
        min: f64,
        max: f64,
    },

    #[error("{setpoint} must be a multiple of {step} °C, got {celsius}")]
    OffStep {
        setpoint: Setpoint,
        celsius: f64,
        step: f64,
    },

    #[error("{0} is not a number")]
    NotFinite(f64),
}

/// A writable temperature target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setpoint {
    HotWater,
    Room,
}

impl Setpoint {
    pub const ALL: [Setpoint; 2] = [Setpoint::HotWater, Setpoint::Room];

    /// Holding register storing the target
    pub fn register(self) -> u16 {
        match self {
            Setpoint::HotWater => 1,
            Setpoint::Room => 723,
        }
    }

    pub fn min_celsius(self) -> f64 {
        match self {
            Setpoint::HotWater => 35.0,
            Setpoint::Room => 15.0,
        }
    }

    pub fn max_celsius(self) -> f64 {
        match self {
            Setpoint::HotWater => 60.0,
            Setpoint::Room => 25.0,
        }
    }

    pub fn step(self) -> f64 {
        0.5
    }

    /// Snapshot key of the measured temperature
    pub fn current_key(self) -> &'static str {
        match self {
            Setpoint::HotWater => "warmwasser_ist_temperatur",
            Setpoint::Room => "raum_ist_temperatur",
        }
    }

    /// Snapshot key of the stored target
    pub fn target_key(self) -> &'static str {
        match self {
            Setpoint::HotWater => "warmwasser_soll_temperatur",
            Setpoint::Room => "raum_soll_temperatur",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Setpoint::HotWater => "Warmwasser Temperatur",
            Setpoint::Room => "Raum Soll-Temperatur",
        }
    }

    pub fn current(self, snapshot: &Snapshot) -> Option<f64> {
        snapshot.get_f64(self.current_key())
    }

    pub fn target(self, snapshot: &Snapshot) -> Option<f64> {
        snapshot.get_f64(self.target_key())
    }

    /// Check a requested temperature and encode it in tenths of a degree.
    pub fn encode(self, celsius: f64) -> Result<u16, SetpointError> {
        if !celsius.is_finite() {
            return Err(SetpointError::NotFinite(celsius));
        }
        if celsius < self.min_celsius() || celsius > self.max_celsius() {
            return Err(SetpointError::OutOfRange {
                setpoint: self,
                celsius,
                min: self.min_celsius(),
                max: self.max_celsius(),
            });
        }
        let steps = celsius / self.step();
        if (steps - steps.round()).abs() > 1e-6 {
            return Err(SetpointError::OffStep {
                setpoint: self,
                celsius,
                step: self.step(),
            });
        }
        // Range checked above, fits comfortably in u16
        Ok((celsius * 10.0).round() as u16)
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Setpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "hot-water" | "warmwasser" | "dhw" => Ok(Setpoint::HotWater),
            "room" | "raum" => Ok(Setpoint::Room),
            other => Err(format!("unknown setpoint '{}'", other)),
        }
    }
}

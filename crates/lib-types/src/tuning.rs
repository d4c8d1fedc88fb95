//! Tunable equalizer settings.
//!
//! An [`EqTuning`] is the complete set of knobs the optimizer is allowed to
//! turn: Tx FFE tap tuners, the receive CTLE and the DFE assumption used by
//! the cost model.

use crate::error::{ConfigError, ConfigResult};
use crate::units::Hertz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One adjustable equalizer coefficient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TapTuner {
    pub name: String,
    pub enabled: bool,
    pub min_val: f64,
    pub max_val: f64,
    #[serde(default)]
    pub value: f64,
    /// Sweep step count; zero means not swept.
    #[serde(default)]
    pub steps: u32,
}

impl TapTuner {
    pub fn new(name: impl Into<String>, enabled: bool, min_val: f64, max_val: f64) -> Self {
        Self {
            name: name.into(),
            enabled,
            min_val,
            max_val,
            value: 0.0,
            steps: 0,
        }
    }

    /// Contribution to the FFE: the value when enabled, zero otherwise.
    #[inline]
    pub fn effective_value(&self) -> f64 {
        if self.enabled {
            self.value
        } else {
            0.0
        }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_val, self.max_val)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_val > self.max_val {
            return Err(ConfigError::invalid(format!(
                "tap '{}' has min {} above max {}",
                self.name, self.min_val, self.max_val
            )));
        }
        if self.enabled {
            ConfigError::check_range(&self.name, self.value, self.min_val, self.max_val)?;
        }
        Ok(())
    }
}

/// Implement lowercase string (de)serialization over `as_str`/`FromStr`.
macro_rules! string_enum_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Line coding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Modulation {
    #[default]
    Nrz,
    Duobinary,
    Pam4,
}

impl Modulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nrz => "nrz",
            Self::Duobinary => "duobinary",
            Self::Pam4 => "pam4",
        }
    }
}

impl FromStr for Modulation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nrz" => Ok(Self::Nrz),
            "duobinary" | "duo-binary" => Ok(Self::Duobinary),
            "pam4" => Ok(Self::Pam4),
            _ => Err(ConfigError::UnknownMode {
                kind: "modulation",
                value: s.to_string(),
            }),
        }
    }
}

string_enum_serde!(Modulation);

/// CTLE operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CtleMode {
    /// All-pass.
    #[default]
    Off,
    /// Boost normalized so the response never exceeds unity.
    Passive,
    /// Boost with unity DC gain.
    Agc,
    /// Boost with a user DC offset.
    Manual,
}

impl CtleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Passive => "passive",
            Self::Agc => "agc",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for CtleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "passive" => Ok(Self::Passive),
            "agc" => Ok(Self::Agc),
            "manual" => Ok(Self::Manual),
            _ => Err(ConfigError::UnknownMode {
                kind: "CTLE",
                value: s.to_string(),
            }),
        }
    }
}

string_enum_serde!(CtleMode);

/// Receive CTLE parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CtleSettings {
    pub peak_freq: Hertz,
    pub peak_mag_db: f64,
    /// Receiver bandwidth limit.
    pub rx_bw: Hertz,
    pub offset_db: f64,
    pub mode: CtleMode,
}

/// DFE assumption used by the cost model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfeSettings {
    pub enabled: bool,
    pub n_taps: usize,
}

/// Everything the optimizer may adjust.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EqTuning {
    pub tx_taps: Vec<TapTuner>,
    pub ctle: CtleSettings,
    pub dfe: DfeSettings,
}

impl EqTuning {
    /// Indices of enabled Tx tap tuners.
    pub fn enabled_tap_indices(&self) -> Vec<usize> {
        self.tx_taps
            .iter()
            .enumerate()
            .filter(|(_, t)| t.enabled)
            .map(|(i, _)| i)
            .collect()
    }

    /// Values of enabled Tx tap tuners, in tuner order.
    pub fn enabled_tap_values(&self) -> Vec<f64> {
        self.tx_taps
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.value)
            .collect()
    }

    /// Write `values` into the enabled tuners, in tuner order.
    ///
    /// Extra values are ignored; missing values leave tuners untouched.
    pub fn set_enabled_tap_values(&mut self, values: &[f64]) {
        for (tuner, &v) in self.tx_taps.iter_mut().filter(|t| t.enabled).zip(values) {
            tuner.value = v;
        }
    }

    /// Per-tuner FFE contribution (zero for disabled tuners).
    pub fn effective_tap_values(&self) -> Vec<f64> {
        self.tx_taps.iter().map(TapTuner::effective_value).collect()
    }

    pub fn validate(&self, max_ctle_peak: f64) -> ConfigResult<()> {
        for tuner in &self.tx_taps {
            tuner.validate()?;
        }
        ConfigError::check_range("CTLE peak magnitude", self.ctle.peak_mag_db, 0.0, max_ctle_peak)?;
        if !(self.ctle.peak_freq.0 > 0.0) {
            return Err(ConfigError::invalid("CTLE peak frequency must be positive"));
        }
        if !(self.ctle.rx_bw.0 > 0.0) {
            return Err(ConfigError::invalid("Rx bandwidth must be positive"));
        }
        Ok(())
    }
}

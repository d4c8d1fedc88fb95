//! Physical units with type safety.
//!
//! These newtypes keep channel and equalizer quantities from being mixed
//! up (a CTLE corner in Hertz is not a sample period in Seconds).

use serde::{Deserialize, Serialize};
use std::ops::{Div, Mul};

/// Speed of light in vacuum (m/s), as used by the line model.
pub const SPEED_OF_LIGHT: f64 = 3.0e8;

/// Time duration in seconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Seconds(pub f64);

impl Seconds {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub fn from_ps(ps: f64) -> Self {
        Self(ps * 1e-12)
    }

    #[inline]
    pub fn from_ns(ns: f64) -> Self {
        Self(ns * 1e-9)
    }

    #[inline]
    pub fn as_ps(&self) -> f64 {
        self.0 * 1e12
    }

    #[inline]
    pub fn as_ns(&self) -> f64 {
        self.0 * 1e9
    }
}

impl Mul<f64> for Seconds {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Seconds {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self(self.0 / rhs)
    }
}

/// Ratio of two durations.
impl Div<Seconds> for Seconds {
    type Output = f64;
    fn div(self, rhs: Seconds) -> f64 {
        self.0 / rhs.0
    }
}

/// Frequency in Hertz.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Hertz(pub f64);

impl Hertz {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub fn from_ghz(ghz: f64) -> Self {
        Self(ghz * 1e9)
    }

    #[inline]
    pub fn as_ghz(&self) -> f64 {
        self.0 * 1e-9
    }

    /// Angular frequency (omega = 2 * pi * f).
    #[inline]
    pub fn angular(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.0
    }
}

/// Impedance or resistance in Ohms.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Ohms(pub f64);

impl Ohms {
    /// Differential 100 ohm reference impedance.
    pub const Z0_DIFF_100: Self = Self(100.0);
}

/// Capacitance in Farads.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Farads(pub f64);

impl Farads {
    #[inline]
    pub fn from_pf(pf: f64) -> Self {
        Self(pf * 1e-12)
    }

    #[inline]
    pub fn from_uf(uf: f64) -> Self {
        Self(uf * 1e-6)
    }
}

/// Data rate in bits per second.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct BitsPerSecond(pub f64);

impl BitsPerSecond {
    #[inline]
    pub fn from_gbps(gbps: f64) -> Self {
        Self(gbps * 1e9)
    }

    /// Bit period.
    #[inline]
    pub fn bit_time(&self) -> Seconds {
        Seconds(1.0 / self.0)
    }
}

/// Convert a decibel magnitude to a linear voltage ratio.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

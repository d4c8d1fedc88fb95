//! Response types that flow through the equalization pipeline.
//!
//! Channel, FFE and CTLE stages each produce an [`ImpulseResponse`]; their
//! convolution is scored as a [`PulseResponse`] and summarized in a
//! [`CostState`].

use crate::units::Seconds;
use crate::waveform::{cumsum, peak_of};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Cost reported when no main lobe can be located in a pulse response.
///
/// Large relative to any achievable cost of a unit-DC-gain link, so a
/// minimizer that wanders into a broken configuration turns back.
pub const DEGENERATE_COST: f64 = 1.0;

/// Sampled impulse response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpulseResponse {
    /// Response per sample (sums to the DC gain).
    pub samples: Vec<f64>,

    /// Sample period.
    pub dt: Seconds,

    /// Index in the untrimmed response where `samples[0]` came from.
    pub start_index: usize,

    /// Propagation delay attributed to the response.
    pub group_delay: Seconds,
}

impl ImpulseResponse {
    /// A response starting at index zero with no attributed delay.
    pub fn new(samples: Vec<f64>, dt: Seconds) -> Self {
        Self {
            samples,
            dt,
            start_index: 0,
            group_delay: Seconds::ZERO,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// DC gain of the response.
    pub fn sum(&self) -> f64 {
        self.samples.iter().sum()
    }

    pub fn peak(&self) -> Option<(usize, f64)> {
        peak_of(&self.samples)
    }

    /// Step response (running sum).
    pub fn step(&self) -> Vec<f64> {
        cumsum(&self.samples)
    }

    /// Pulse response for a unit interval of `nspui` samples.
    pub fn to_pulse(&self, nspui: usize) -> PulseResponse {
        PulseResponse::from_impulse(&self.samples, nspui)
    }
}

/// Complex response on the simulation frequency grid (non-shifted FFT order).
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyResponse {
    pub values: Vec<Complex64>,
}

impl FrequencyResponse {
    pub fn new(values: Vec<Complex64>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at zero frequency.
    pub fn dc(&self) -> Complex64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// Largest magnitude over the grid.
    pub fn max_magnitude(&self) -> f64 {
        self.values.iter().map(|v| v.norm()).fold(0.0, f64::max)
    }
}

/// Response to a one-unit-interval rectangular pulse.
///
/// `samples[i] = s[i] - s[i - nspui]` where `s` is the step response and
/// `s` is taken as zero before the first sample.
#[derive(Clone, Debug, PartialEq)]
pub struct PulseResponse {
    pub samples: Vec<f64>,
    pub nspui: usize,
}

impl PulseResponse {
    pub fn from_impulse(h: &[f64], nspui: usize) -> Self {
        let s = cumsum(h);
        let samples = s
            .iter()
            .enumerate()
            .map(|(i, &v)| if i >= nspui { v - s[i - nspui] } else { v })
            .collect();
        Self { samples, nspui }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Scored equalization result plus the artifacts needed to draw it.
#[derive(Clone, Debug, PartialEq)]
pub struct CostState {
    /// Residual ISI minus main-cursor amplitude. Lower is better.
    pub cost: f64,

    /// Pulse response after DFE emulation.
    pub pulse: Vec<f64>,

    /// Detection threshold everywhere except zeroed clock instants.
    pub clocks: Vec<f64>,

    /// Sampling instant of the main cursor.
    pub clock_pos: usize,

    /// Pulse value at `clock_pos`.
    pub main_cursor: f64,

    /// Accumulated absolute ISI.
    pub isi: f64,

    /// No main lobe was found and `cost` is [`DEGENERATE_COST`].
    pub degenerate: bool,
}

impl CostState {
    pub fn degenerate(pulse: Vec<f64>) -> Self {
        let clocks = vec![0.0; pulse.len()];
        Self {
            cost: DEGENERATE_COST,
            pulse,
            clocks,
            clock_pos: 0,
            main_cursor: 0.0,
            isi: 0.0,
            degenerate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_from_impulse() {
        let h = vec![0.5, 0.25, 0.25, 0.0, 0.0];
        let p = PulseResponse::from_impulse(&h, 2);

        // s = [0.5, 0.75, 1.0, 1.0, 1.0]
        let expected = [0.5, 0.75, 0.5, 0.25, 0.0];
        for (a, b) in p.samples.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pulse_of_short_response() {
        let p = PulseResponse::from_impulse(&[1.0], 4);
        assert_eq!(p.samples, vec![1.0]);
    }

    #[test]
    fn test_impulse_sum_and_step() {
        let h = ImpulseResponse::new(vec![0.25, 0.5, 0.25], Seconds(1e-12));
        assert!((h.sum() - 1.0).abs() < 1e-15);
        assert_eq!(h.step(), vec![0.25, 0.75, 1.0]);
        assert_eq!(h.peak(), Some((1, 0.5)));
    }

    #[test]
    fn test_degenerate_state() {
        let state = CostState::degenerate(vec![0.0; 8]);
        assert!(state.degenerate);
        assert_eq!(state.cost, DEGENERATE_COST);
        assert_eq!(state.clocks.len(), 8);
    }
}

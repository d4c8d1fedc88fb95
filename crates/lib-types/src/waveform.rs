//! Uniformly sampled time-domain sequences.
//!
//! A `Waveform` is what a channel importer hands back: point samples at
//! `t[i] = t_start + i * dt`. Impulse responses are derived from it once
//! the channel model has decided whether it is a step or an impulse.

use crate::units::Seconds;
use serde::{Deserialize, Serialize};

/// A uniformly-sampled time-domain waveform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Sample values.
    pub samples: Vec<f64>,

    /// Time step between consecutive samples.
    pub dt: Seconds,

    /// Time of the first sample.
    pub t_start: Seconds,
}

impl Waveform {
    pub fn new(samples: Vec<f64>, dt: Seconds, t_start: Seconds) -> Self {
        Self { samples, dt, t_start }
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

/// Index and value of the largest finite sample of a slice.
///
/// Ties resolve to the first occurrence. Returns `None` for an empty slice
/// or one with no finite values.
pub fn peak_of(samples: &[f64]) -> Option<(usize, f64)> {
    samples
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}

/// Running sum of a sequence.
pub fn cumsum(samples: &[f64]) -> Vec<f64> {
    samples
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

//! FFE and CTLE synthesis on a fixed simulation grid.

use crate::ctle::{ctle_impulse, ctle_response};
use crate::error::DspResult;
use crate::ffe::ffe_impulse;
use crate::fft::FftEngine;
use crate::grid::SimulationGrid;
use lib_types::{CtleSettings, ImpulseResponse, Seconds, TapTuner};
use realfft::ComplexToReal;
use std::f64::consts::PI;
use std::sync::Arc;

/// Builds equalizer impulse responses for one grid and channel length.
///
/// The inverse-transform plan is prepared once, so the synthesizer is cheap
/// to call from an optimizer's objective function and can be shared across
/// threads.
pub struct EqualizerSynthesizer {
    nspui: usize,
    ts: Seconds,
    /// CTLE responses are cut to this many samples (the channel length).
    len_h: usize,
    /// Non-negative half of the angular frequency grid.
    w_half: Vec<f64>,
    irfft: Arc<dyn ComplexToReal<f64>>,
}

impl EqualizerSynthesizer {
    pub fn new(grid: &SimulationGrid, len_h: usize) -> DspResult<Self> {
        let irfft = FftEngine::new().plan_irfft(grid.npts())?;
        let w_half = grid.f_half().into_iter().map(|f| 2.0 * PI * f).collect();
        Ok(Self {
            nspui: grid.nspui,
            ts: grid.ts(),
            len_h,
            w_half,
            irfft,
        })
    }

    #[inline]
    pub fn nspui(&self) -> usize {
        self.nspui
    }

    #[inline]
    pub fn len_h(&self) -> usize {
        self.len_h
    }

    /// Tx FFE impulse response.
    pub fn ffe(&self, tuners: &[TapTuner]) -> ImpulseResponse {
        ImpulseResponse::new(ffe_impulse(tuners, self.nspui), self.ts)
    }

    /// Rx CTLE impulse response, truncated to the channel length with its
    /// DC gain restored.
    pub fn ctle(&self, settings: &CtleSettings) -> DspResult<ImpulseResponse> {
        let half = ctle_response(settings, &self.w_half);
        let h = ctle_impulse(self.irfft.as_ref(), &half, self.len_h)?;
        Ok(ImpulseResponse::new(h, self.ts))
    }
}

impl std::fmt::Debug for EqualizerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqualizerSynthesizer")
            .field("nspui", &self.nspui)
            .field("ts", &self.ts)
            .field("len_h", &self.len_h)
            .field("bins", &self.w_half.len())
            .finish()
    }
}

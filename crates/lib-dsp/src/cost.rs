//! "Hula-Hoop" ISI cost.
//!
//! A pulse response is scored by residual ISI at the ideal sampling instant
//! minus the main cursor. The sampling instant is the centre of the main
//! lobe, found by tuning a threshold until exactly one unit interval of the
//! pulse sits above it (SiSoft/Tellian, DesignCon 2016).

use lib_types::{CostState, DfeSettings, Modulation, PulseResponse};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

/// Sink name of the scored pulse response.
pub const PULSE_SERIES: &str = "ctle_out_h_tune";

/// Sink name of the clock-marker array.
pub const CLOCKS_SERIES: &str = "clocks_tune";

/// Threshold refinement stops once the step is `p_max / MAX_DIVISOR`.
const MAX_DIVISOR: f64 = 5000.0;

/// Write-only destination for named plot series.
pub trait SeriesSink: Send + Sync {
    fn set(&self, name: &str, values: Vec<f64>);
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SeriesSink for NullSink {
    fn set(&self, _name: &str, _values: Vec<f64>) {}
}

/// Sink that keeps the latest value of every series.
#[derive(Debug, Default)]
pub struct SeriesStore {
    series: Mutex<HashMap<String, Vec<f64>>>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<f64>> {
        let series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        series.get(name).cloned()
    }
}

impl SeriesSink for SeriesStore {
    fn set(&self, name: &str, values: Vec<f64>) {
        let mut series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        series.insert(name.to_string(), values);
    }
}

/// Scores combined impulse responses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostEvaluator {
    pub nspui: usize,
    pub modulation: Modulation,
    /// Post-cursor ISI is assumed cancelled by a DFE.
    pub use_dfe: bool,
    pub dfe_taps: usize,
}

impl CostEvaluator {
    pub fn new(nspui: usize, modulation: Modulation, dfe: DfeSettings) -> Self {
        Self {
            nspui,
            modulation,
            use_dfe: dfe.enabled,
            dfe_taps: dfe.n_taps,
        }
    }

    /// Score `h` and publish the pulse and clock series to `sink`.
    pub fn evaluate_and_publish(&self, h: &[f64], sink: &dyn SeriesSink) -> CostState {
        let state = self.evaluate(h);
        sink.set(PULSE_SERIES, state.pulse.clone());
        sink.set(CLOCKS_SERIES, state.clocks.clone());
        state
    }

    /// Score a combined impulse response.
    ///
    /// Never fails: a response with no detectable main lobe scores
    /// [`lib_types::DEGENERATE_COST`].
    pub fn evaluate(&self, h: &[f64]) -> CostState {
        let nspui = self.nspui.max(1);
        let mut p = PulseResponse::from_impulse(h, nspui).samples;
        let duobinary = self.modulation == Modulation::Duobinary;

        let Some((thresh, first, last)) = find_main_lobe(&p, nspui) else {
            warn!(len = p.len(), "no main lobe in pulse response");
            return CostState::degenerate(p);
        };

        let mut clock_pos = (first + last) / 2;
        if duobinary {
            match clock_pos.checked_sub(nspui / 2) {
                Some(pos) if pos + nspui < p.len() => clock_pos = pos,
                _ => {
                    warn!(clock_pos, "duo-binary clock pair does not fit the pulse response");
                    return CostState::degenerate(p);
                }
            }
        }

        let mut clocks = vec![thresh; p.len()];
        clocks[clock_pos] = 0.0;
        if duobinary {
            clocks[clock_pos + nspui] = 0.0;
        }

        let mut isi = 0.0;
        let mut ix = clock_pos;
        while let Some(prev) = ix.checked_sub(nspui) {
            clocks[prev] = 0.0;
            isi += p[prev].abs();
            ix = prev;
        }

        // First cursor after the wanted symbol.
        let post = clock_pos + if duobinary { 2 * nspui } else { nspui };
        for ix in (post..p.len()).step_by(nspui) {
            clocks[ix] = 0.0;
            if !self.use_dfe {
                isi += p[ix].abs();
            }
        }

        if self.use_dfe {
            // Each tap cancels its cursor and everything it would feed back
            // from half a UI before that cursor onwards.
            let first_cursor = post - nspui;
            for i in 0..self.dfe_taps {
                let cursor = first_cursor + nspui * (1 + i);
                if cursor >= p.len() {
                    break;
                }
                let value = p[cursor];
                let from = first_cursor + nspui / 2 + nspui * i;
                for v in p[from..].iter_mut() {
                    *v -= value;
                }
            }
        }

        let main_cursor = p[clock_pos];
        let cost = if duobinary {
            let second = p[clock_pos + nspui];
            isi - main_cursor - second + 2.0 * (second - main_cursor).abs()
        } else {
            isi - main_cursor
        };

        CostState {
            cost,
            pulse: p,
            clocks,
            clock_pos,
            main_cursor,
            isi,
            degenerate: false,
        }
    }
}

/// Tune a threshold until the samples above it span one unit interval.
///
/// Returns the final threshold and the first and last indices above it, or
/// `None` when nothing exceeds half the pulse maximum.
fn find_main_lobe(p: &[f64], nspui: usize) -> Option<(f64, usize, usize)> {
    let p_max = p.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lobe = |thresh: f64| {
        let first = p.iter().position(|&v| v > thresh)?;
        let last = p.iter().rposition(|&v| v > thresh)?;
        Some((first, last))
    };
    let span_error = |first: usize, last: usize| last as isize - first as isize - nspui as isize;

    let mut div = 2.0;
    let mut thresh = p_max / div;
    let (mut first, mut last) = lobe(thresh)?;
    let mut err = span_error(first, last);

    while err != 0 && div < MAX_DIVISOR {
        div *= 2.0;
        if err > 0 {
            thresh += p_max / div;
        } else {
            thresh -= p_max / div;
        }
        (first, last) = lobe(thresh)?;
        err = span_error(first, last);
    }

    Some((thresh, first, last))
}

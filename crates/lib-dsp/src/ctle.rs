//! Rx continuous-time linear equalizer.
//!
//! The boost is a single zero/pole pair placed so the peaking shelf is
//! reached at `peak_freq`, rolled off by a first-order bandwidth limit:
//!
//! ```text
//! B(jw) = 1 + (A - 1) * (jw/wp) / (1 + jw/wp) * 1 / (1 + jw/wb)
//! ```
//!
//! with `A = 10^(peak_mag/20)`. DC gain is unity, and a 0 dB peak makes the
//! whole boost collapse to 1.

use crate::error::{DspError, DspResult};
use crate::fft::irfft_with;
use lib_types::{db_to_linear, CtleMode, CtleSettings, FrequencyResponse};
use num_complex::Complex64;
use realfft::ComplexToReal;

/// CTLE transfer function at each angular frequency in `w`.
pub fn ctle_response(settings: &CtleSettings, w: &[f64]) -> FrequencyResponse {
    let unity = Complex64::new(1.0, 0.0);
    if settings.mode == CtleMode::Off {
        return FrequencyResponse::new(vec![unity; w.len()]);
    }

    let boost = db_to_linear(settings.peak_mag_db) - 1.0;
    let wp = settings.peak_freq.angular();
    let wb = settings.rx_bw.angular();

    let mut values: Vec<Complex64> = w
        .iter()
        .map(|&w| {
            let sp = Complex64::new(0.0, w / wp);
            let sb = Complex64::new(0.0, w / wb);
            unity + boost * sp / (unity + sp) / (unity + sb)
        })
        .collect();

    match settings.mode {
        CtleMode::Passive => {
            let peak = values.iter().map(|v| v.norm()).fold(0.0, f64::max);
            if peak > 0.0 {
                for v in values.iter_mut() {
                    *v /= peak;
                }
            }
        }
        CtleMode::Manual => {
            let gain = db_to_linear(settings.offset_db);
            for v in values.iter_mut() {
                *v *= gain;
            }
        }
        CtleMode::Agc | CtleMode::Off => {}
    }

    FrequencyResponse::new(values)
}

/// Truncated CTLE impulse response.
///
/// `half` is the response on the non-negative half of the simulation grid.
/// The inverse transform is cut to `len_h` samples and rescaled so its sum
/// equals `|H(0)|`.
pub fn ctle_impulse(
    plan: &dyn ComplexToReal<f64>,
    half: &FrequencyResponse,
    len_h: usize,
) -> DspResult<Vec<f64>> {
    let mut h = irfft_with(plan, &half.values)?;
    h.truncate(len_h.max(1));

    let sum: f64 = h.iter().sum();
    if !sum.is_finite() || sum.abs() < f64::EPSILON {
        return Err(DspError::NumericalInstability(format!(
            "truncated CTLE impulse response sums to {}",
            sum
        )));
    }
    let scale = half.dc().norm() / sum;
    for v in h.iter_mut() {
        *v *= scale;
    }
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::FftEngine;
    use crate::grid::SimulationGrid;
    use lib_types::{Hertz, Seconds};
    use std::f64::consts::PI;

    fn settings(mode: CtleMode) -> CtleSettings {
        CtleSettings {
            peak_freq: Hertz::from_ghz(5.0),
            peak_mag_db: 10.0,
            rx_bw: Hertz::from_ghz(12.0),
            offset_db: 3.0,
            mode,
        }
    }

    fn half_w(grid: &SimulationGrid) -> Vec<f64> {
        grid.f_half().into_iter().map(|f| 2.0 * PI * f).collect()
    }

    #[test]
    fn test_off_is_all_pass() {
        let grid = SimulationGrid::new(Seconds(1e-10), 32, 64).unwrap();
        let w = half_w(&grid);
        let h_f = ctle_response(&settings(CtleMode::Off), &w);
        assert!(h_f.values.iter().all(|v| *v == Complex64::new(1.0, 0.0)));

        let plan = FftEngine::new().plan_irfft(grid.npts()).unwrap();
        let h = ctle_impulse(plan.as_ref(), &h_f, 100).unwrap();
        assert!((h[0] - 1.0).abs() < 1e-12);
        assert!(h[1..].iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_dc_gain_exact_for_every_mode() {
        let grid = SimulationGrid::new(Seconds(1e-10), 32, 64).unwrap();
        let w = half_w(&grid);
        let plan = FftEngine::new().plan_irfft(grid.npts()).unwrap();

        for mode in [CtleMode::Off, CtleMode::Passive, CtleMode::Agc, CtleMode::Manual] {
            let h_f = ctle_response(&settings(mode), &w);
            let h = ctle_impulse(plan.as_ref(), &h_f, 200).unwrap();
            let sum: f64 = h.iter().sum();
            assert!(
                (sum - h_f.dc().norm()).abs() < 1e-12,
                "{:?}: sum {} vs |H(0)| {}",
                mode,
                sum,
                h_f.dc().norm()
            );
        }
    }

    #[test]
    fn test_mode_dc_gains() {
        let w = [0.0, 2.0 * PI * 5e9, 2.0 * PI * 20e9];

        let agc = ctle_response(&settings(CtleMode::Agc), &w);
        assert!((agc.dc().re - 1.0).abs() < 1e-12);
        assert!(agc.values[1].norm() > 1.5);

        let manual = ctle_response(&settings(CtleMode::Manual), &w);
        assert!((manual.dc().re - db_to_linear(3.0)).abs() < 1e-12);

        let passive = ctle_response(&settings(CtleMode::Passive), &w);
        assert!(passive.max_magnitude() <= 1.0 + 1e-12);
        assert!(passive.dc().re < 1.0);
    }

    #[test]
    fn test_zero_peak_manual_matches_off() {
        let w: Vec<f64> = (0..50).map(|i| i as f64 * 1e9).collect();
        let mut manual = settings(CtleMode::Manual);
        manual.peak_mag_db = 0.0;
        manual.offset_db = 0.0;

        let off = ctle_response(&settings(CtleMode::Off), &w);
        let manual = ctle_response(&manual, &w);
        for (a, b) in off.values.iter().zip(manual.values.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }
}

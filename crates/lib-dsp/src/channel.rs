//! Channel impulse response.
//!
//! A channel is either a lossy RLGC line between a Tx output network and an
//! AC-coupled Rx termination, or a measured step/impulse response read
//! through a [`WaveformImporter`]. Both paths end in the same trimming and
//! unit-DC-gain normalization.

use crate::error::{DspError, DspResult};
use crate::fft::FftEngine;
use crate::grid::SimulationGrid;
use lib_types::{
    ChannelParams, FrequencyResponse, ImpulseResponse, LinkConfig, PulseResponse, Seconds,
    Waveform, SPEED_OF_LIGHT,
};
use num_complex::Complex64;
use rayon::prelude::*;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of measured channel waveforms.
pub trait WaveformImporter: Send + Sync {
    /// Read `path` and return it sampled every `ts`, starting at t = 0.
    fn import(&self, path: &Path, ts: Seconds) -> DspResult<Waveform>;
}

/// Per-unit-length description of a lossy line (Johnson metallic model).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineModel {
    /// DC resistance (Ohms/m).
    pub rdc: f64,
    /// Skin-effect transition frequency (rad/s).
    pub w0: f64,
    /// Skin-effect resistance at `w0` (Ohms/m).
    pub r0: f64,
    /// Loss tangent.
    pub theta0: f64,
    /// Nominal impedance (Ohms).
    pub z0: f64,
    /// Propagation velocity (m/s).
    pub v0: f64,
    /// Length (m).
    pub length: f64,
}

impl LineModel {
    pub fn from_params(params: &ChannelParams) -> Self {
        Self {
            rdc: params.rdc,
            w0: params.w0,
            r0: params.r0,
            theta0: params.theta0,
            z0: params.z0,
            v0: params.v0 * SPEED_OF_LIGHT,
            length: params.length_m,
        }
    }

    /// Propagation constant and characteristic impedance at angular
    /// frequency `w`. Zero frequency is evaluated at 1e-12 rad/s.
    pub fn gamma(&self, w: f64) -> (Complex64, Complex64) {
        let w = if w == 0.0 { 1e-12 } else { w };
        let jw = Complex64::new(0.0, w);

        let rac = self.r0 * (2.0 * jw / self.w0).sqrt();
        let r = (Complex64::new(self.rdc * self.rdc, 0.0) + rac * rac).sqrt();
        let l0 = self.z0 / self.v0;
        let c0 = 1.0 / (self.z0 * self.v0);
        let c = c0 * (jw / self.w0).powf(-2.0 * self.theta0 / PI);

        let series = jw * l0 + r;
        let shunt = jw * c;
        ((series * shunt).sqrt(), (series / shunt).sqrt())
    }

    /// Bare line transfer function `exp(-length * gamma)` and `Zc`.
    pub fn transfer(&self, w: f64) -> (Complex64, Complex64) {
        let (gamma, zc) = self.gamma(w);
        ((-self.length * gamma).exp(), zc)
    }

    /// Propagation delay of the line.
    pub fn delay(&self) -> Seconds {
        Seconds(self.length / self.v0)
    }
}

/// Tx output and Rx input networks around the line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Terminations {
    /// Tx output resistance (Ohms).
    pub rs: f64,
    /// Tx output capacitance (F).
    pub cs: f64,
    /// Rx termination resistance (Ohms).
    pub rl: f64,
    /// Rx input capacitance (F).
    pub cp: f64,
    /// AC coupling capacitance (F), one in each leg.
    pub cl: f64,
}

impl Terminations {
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            rs: config.tx.rs,
            cs: config.tx.cout().0,
            rl: config.rx.rin,
            cp: config.rx.cin().0,
            cl: config.rx.cac().0,
        }
    }

    /// Voltage at the Rx termination per unit of Tx source voltage, for a
    /// line with transfer `h` and characteristic impedance `zc`.
    pub fn loaded_response(&self, h: Complex64, zc: Complex64, w: f64) -> Complex64 {
        let w = if w == 0.0 { 1e-12 } else { w };
        let jw = Complex64::new(0.0, w);
        let one = Complex64::new(1.0, 0.0);

        let zs = self.rs / (one + jw * self.rs * self.cs);
        let z_term = self.rl / (one + jw * self.rl * self.cp);
        let zl = 2.0 / (jw * self.cl) + z_term;

        let zc_par_cs = zc / (one + jw * zc * self.cs);
        let launch = zc_par_cs / (self.rs + zc_par_cs);

        let rho_l = (zl - zc) / (zl + zc);
        let rho_s = (zs - zc) / (zs + zc);

        let g = launch * h * (one + rho_l) / (one - rho_l * rho_s * h * h);
        g * z_term / zl
    }
}

/// Where the channel response comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelSource {
    Line {
        line: LineModel,
        terminations: Terminations,
    },
    File(PathBuf),
}

/// Channel model plus its trimming policy.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelModel {
    pub source: ChannelSource,

    /// Fixed response length; `None` trims automatically.
    pub impulse_length: Option<Seconds>,
}

/// Output of [`ChannelModel::compute`].
#[derive(Clone, Debug)]
pub struct ChannelResponse {
    /// Trimmed, unit-sum impulse response.
    pub impulse: ImpulseResponse,

    /// Untrimmed frequency response on the simulation grid.
    pub spectrum: FrequencyResponse,

    /// Step response of the trimmed impulse.
    pub step: Vec<f64>,

    /// Pulse response of the trimmed impulse.
    pub pulse: PulseResponse,

    /// Plot time axis of the trimmed impulse (ns).
    pub t_ns: Vec<f64>,
}

impl ChannelModel {
    pub fn from_config(config: &LinkConfig) -> Self {
        let source = match &config.channel.file {
            Some(path) => ChannelSource::File(path.clone()),
            None => ChannelSource::Line {
                line: LineModel::from_params(&config.channel),
                terminations: Terminations::from_config(config),
            },
        };
        Self {
            source,
            impulse_length: config.impulse_length(),
        }
    }

    /// Compute the channel impulse response on `grid`.
    ///
    /// `importer` is required only for a file source.
    pub fn compute(
        &self,
        grid: &SimulationGrid,
        importer: Option<&dyn WaveformImporter>,
    ) -> DspResult<ChannelResponse> {
        let ts = grid.ts();
        let npts = grid.npts();
        let mut engine = FftEngine::new();

        let (raw, spectrum, group_delay) = match &self.source {
            ChannelSource::Line { line, terminations } => {
                let w = grid.w();
                let spectrum: Vec<Complex64> = w
                    .par_iter()
                    .map(|&w| {
                        let (h, zc) = line.transfer(w);
                        2.0 * terminations.loaded_response(h, zc, w)
                    })
                    .collect();
                let raw = engine.ifft_real(&spectrum)?;
                (raw, spectrum, line.delay())
            }
            ChannelSource::File(path) => {
                let importer = importer.ok_or_else(|| {
                    DspError::import(path, "no waveform importer configured")
                })?;
                let waveform = importer.import(path, ts)?;
                let mut raw = impulse_from_measurement(waveform.samples, ts);

                let (peak_ix, _) = peak_index(&raw)
                    .ok_or_else(|| DspError::PeakNotFound(path.display().to_string()))?;
                let group_delay = ts * peak_ix as f64;

                raw.resize(npts, 0.0);
                let mut spectrum: Vec<Complex64> =
                    raw.iter().map(|&v| Complex64::new(v, 0.0)).collect();
                engine.fft_inplace(&mut spectrum)?;
                let dc = spectrum[0];
                let sum: f64 = raw.iter().sum();
                if dc.norm() > 0.0 {
                    let scale = Complex64::new(sum, 0.0) / dc;
                    for v in spectrum.iter_mut() {
                        *v *= scale;
                    }
                }
                (raw, spectrum, group_delay)
            }
        };

        let (min_len, max_len) = match self.impulse_length {
            Some(len) => {
                let n = ((len / ts).round() as usize).max(1);
                (n, n)
            }
            None => (10 * grid.nspui, 100 * grid.nspui),
        };

        let (mut samples, start_index) = trim_impulse(&raw, min_len, max_len)?;
        let sum: f64 = samples.iter().sum();
        if !sum.is_finite() || sum.abs() < f64::EPSILON {
            return Err(DspError::NumericalInstability(format!(
                "channel impulse response sums to {}",
                sum
            )));
        }
        for v in samples.iter_mut() {
            *v /= sum;
        }

        let impulse = ImpulseResponse {
            samples,
            dt: ts,
            start_index,
            group_delay,
        };
        let step = impulse.step();
        let pulse = impulse.to_pulse(grid.nspui);
        let t_ns = (start_index..start_index + impulse.len())
            .map(|i| (ts * i as f64).as_ns())
            .collect();

        info!(
            len = impulse.len(),
            start_index,
            delay_ns = group_delay.as_ns(),
            "channel impulse response ready"
        );

        Ok(ChannelResponse {
            impulse,
            spectrum: FrequencyResponse::new(spectrum),
            step,
            pulse,
            t_ns,
        })
    }
}

/// Turn a measured waveform into response-per-sample.
///
/// A waveform whose last sample is above half its peak is a step response
/// and is differentiated; anything else is an impulse response in V/s and
/// is scaled by the sample period.
fn impulse_from_measurement(samples: Vec<f64>, ts: Seconds) -> Vec<f64> {
    let peak = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let last = samples.last().copied().unwrap_or(0.0);

    if samples.len() > 1 && last > peak / 2.0 {
        debug!("imported waveform treated as a step response");
        samples.windows(2).map(|w| w[1] - w[0]).collect()
    } else {
        debug!("imported waveform treated as an impulse response");
        samples.into_iter().map(|v| v * ts.0).collect()
    }
}

/// Index of the strictly positive maximum, if any.
fn peak_index(g: &[f64]) -> Option<(usize, f64)> {
    lib_types::peak_of(g).filter(|(_, v)| *v > 0.0)
}

/// Trim an impulse response to its significant span.
///
/// The upper half of `g` is discarded as circular-convolution debris. The
/// response ends where 99.8% of the energy has accumulated, but is kept
/// between `min_len` and `max_len` samples counted from the start. The start
/// is the last sample before the peak whose value is under 0.1% of the
/// peak. Returns the trimmed response and its start index in `g`.
pub fn trim_impulse(g: &[f64], min_len: usize, max_len: usize) -> DspResult<(Vec<f64>, usize)> {
    let half = &g[..g.len().div_ceil(2)];
    let (peak_ix, peak) = peak_index(half)
        .ok_or_else(|| DspError::PeakNotFound("channel impulse response".to_string()))?;

    // Signed: an AC-coupled response sits on a small negative baseline
    // before its rise.
    let start = half[..peak_ix]
        .iter()
        .rposition(|&v| v < 0.001 * peak)
        .unwrap_or(0);

    let total: f64 = half[start..].iter().map(|v| v * v).sum();
    let mut acc = 0.0;
    let mut energy_end = half.len();
    for (i, v) in half.iter().enumerate().skip(start) {
        acc += v * v;
        if acc >= 0.998 * total {
            energy_end = i + 1;
            break;
        }
    }

    let min_len = min_len.max(1);
    let max_len = max_len.max(min_len);
    let len = (energy_end - start).clamp(min_len, max_len);
    let stop = (start + len).min(g.len());

    Ok((g[start..stop].to_vec(), start))
}

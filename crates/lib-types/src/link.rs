//! Link configuration.
//!
//! `LinkConfig` carries every physical and algorithmic default of a tuning
//! session. Fields are in the units an engineer types (GHz, pF, ns) and are
//! converted to SI at the accessors. Each field has its own serde default so
//! a partial TOML/JSON file only overrides what it names.

use crate::error::{ConfigError, ConfigResult};
use crate::tuning::{CtleMode, CtleSettings, DfeSettings, EqTuning, Modulation, TapTuner};
use crate::units::{BitsPerSecond, Farads, Hertz, Ohms, Seconds};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level link configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub simulation: SimulationParams,

    #[serde(default)]
    pub channel: ChannelParams,

    #[serde(default)]
    pub tx: TxParams,

    #[serde(default)]
    pub rx: RxParams,

    #[serde(default)]
    pub dfe: DfeParams,

    #[serde(default)]
    pub optimizer: OptimizerParams,
}

/// Bit rate, pattern length and oversampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    #[serde(default = "default_bit_rate_gbps")]
    pub bit_rate_gbps: f64,

    /// Number of bits simulated.
    #[serde(default = "default_nbits")]
    pub nbits: usize,

    /// Samples per bit.
    #[serde(default = "default_nspb")]
    pub nspb: usize,

    #[serde(default)]
    pub modulation: Modulation,
}

fn default_bit_rate_gbps() -> f64 { 10.0 }
fn default_nbits() -> usize { 8000 }
fn default_nspb() -> usize { 32 }

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            bit_rate_gbps: default_bit_rate_gbps(),
            nbits: default_nbits(),
            nspb: default_nspb(),
            modulation: Modulation::default(),
        }
    }
}

impl SimulationParams {
    pub fn bit_rate(&self) -> BitsPerSecond {
        BitsPerSecond::from_gbps(self.bit_rate_gbps)
    }
}

/// Lossy transmission line (24-gauge twisted pair by default), or a file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// DC resistance (Ohms/m).
    #[serde(default = "default_rdc")]
    pub rdc: f64,

    /// Skin-effect transition frequency (rad/s).
    #[serde(default = "default_w0")]
    pub w0: f64,

    /// Skin-effect resistance at `w0` (Ohms/m).
    #[serde(default = "default_r0")]
    pub r0: f64,

    /// Loss tangent.
    #[serde(default = "default_theta0")]
    pub theta0: f64,

    /// Nominal characteristic impedance (Ohms).
    #[serde(default = "default_z0")]
    pub z0: f64,

    /// Propagation velocity as a fraction of c.
    #[serde(default = "default_v0")]
    pub v0: f64,

    #[serde(default = "default_length_m")]
    pub length_m: f64,

    /// Fixed impulse response length (ns); zero selects automatic trimming.
    #[serde(default)]
    pub impulse_length_ns: f64,

    /// Measured step or impulse response to use instead of the line model.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_rdc() -> f64 { 0.1876 }
fn default_w0() -> f64 { 10.0e6 }
fn default_r0() -> f64 { 1.452 }
fn default_theta0() -> f64 { 0.02 }
fn default_z0() -> f64 { Ohms::Z0_DIFF_100.0 }
fn default_v0() -> f64 { 0.67 }
fn default_length_m() -> f64 { 1.0 }

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            rdc: default_rdc(),
            w0: default_w0(),
            r0: default_r0(),
            theta0: default_theta0(),
            z0: default_z0(),
            v0: default_v0(),
            length_m: default_length_m(),
            impulse_length_ns: 0.0,
            file: None,
        }
    }
}

/// Transmitter output network and FFE tuners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxParams {
    /// Output impedance (Ohms).
    #[serde(default = "default_rs")]
    pub rs: f64,

    /// Output capacitance (pF).
    #[serde(default = "default_cout_pf")]
    pub cout_pf: f64,

    /// FFE tuners; index 0 is the single pre-cursor tap.
    #[serde(default = "default_tx_taps")]
    pub taps: Vec<TapTuner>,
}

fn default_rs() -> f64 { 100.0 }
fn default_cout_pf() -> f64 { 0.5 }

fn default_tx_taps() -> Vec<TapTuner> {
    vec![
        TapTuner::new("Pre-tap", true, -0.2, 0.2),
        TapTuner::new("Post-tap1", false, -0.4, 0.4),
        TapTuner::new("Post-tap2", false, -0.3, 0.3),
        TapTuner::new("Post-tap3", false, -0.2, 0.2),
    ]
}

impl Default for TxParams {
    fn default() -> Self {
        Self {
            rs: default_rs(),
            cout_pf: default_cout_pf(),
            taps: default_tx_taps(),
        }
    }
}

impl TxParams {
    pub fn cout(&self) -> Farads {
        Farads::from_pf(self.cout_pf)
    }
}

/// Receiver input network and CTLE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RxParams {
    /// Input impedance (Ohms).
    #[serde(default = "default_rin")]
    pub rin: f64,

    /// Input capacitance (pF).
    #[serde(default = "default_cin_pf")]
    pub cin_pf: f64,

    /// AC coupling capacitance (uF).
    #[serde(default = "default_cac_uf")]
    pub cac_uf: f64,

    /// Bandwidth limit (GHz).
    #[serde(default = "default_bw_ghz")]
    pub bw_ghz: f64,

    #[serde(default)]
    pub ctle: CtleParams,
}

fn default_rin() -> f64 { 100.0 }
fn default_cin_pf() -> f64 { 0.5 }
fn default_cac_uf() -> f64 { 1.0 }
fn default_bw_ghz() -> f64 { 12.0 }

impl Default for RxParams {
    fn default() -> Self {
        Self {
            rin: default_rin(),
            cin_pf: default_cin_pf(),
            cac_uf: default_cac_uf(),
            bw_ghz: default_bw_ghz(),
            ctle: CtleParams::default(),
        }
    }
}

impl RxParams {
    pub fn cin(&self) -> Farads {
        Farads::from_pf(self.cin_pf)
    }

    pub fn cac(&self) -> Farads {
        Farads::from_uf(self.cac_uf)
    }

    pub fn bandwidth(&self) -> Hertz {
        Hertz::from_ghz(self.bw_ghz)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CtleParams {
    #[serde(default = "default_peak_freq_ghz")]
    pub peak_freq_ghz: f64,

    #[serde(default = "default_peak_mag_db")]
    pub peak_mag_db: f64,

    #[serde(default)]
    pub offset_db: f64,

    #[serde(default)]
    pub mode: CtleMode,
}

fn default_peak_freq_ghz() -> f64 { 5.0 }
fn default_peak_mag_db() -> f64 { 10.0 }

impl Default for CtleParams {
    fn default() -> Self {
        Self {
            peak_freq_ghz: default_peak_freq_ghz(),
            peak_mag_db: default_peak_mag_db(),
            offset_db: 0.0,
            mode: CtleMode::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DfeParams {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_dfe_taps")]
    pub n_taps: usize,
}

fn default_true() -> bool { true }
fn default_dfe_taps() -> usize { 5 }

impl Default for DfeParams {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            n_taps: default_dfe_taps(),
        }
    }
}

/// Limits applied by the tuning searches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerParams {
    /// Objective-evaluation budget per search.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Upper bound of the CTLE peak search (dB).
    #[serde(default = "default_max_ctle_peak")]
    pub max_ctle_peak_db: f64,

    /// Limit on the sum of absolute Tx tap values.
    #[serde(default = "default_tap_budget")]
    pub tap_budget: f64,
}

fn default_max_iter() -> usize { 50 }
fn default_max_ctle_peak() -> f64 { 20.0 }
fn default_tap_budget() -> f64 { 0.7 }

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            max_ctle_peak_db: default_max_ctle_peak(),
            tap_budget: default_tap_budget(),
        }
    }
}

impl LinkConfig {
    /// Impulse length override, if one is configured.
    pub fn impulse_length(&self) -> Option<Seconds> {
        (self.channel.impulse_length_ns > 0.0).then(|| Seconds::from_ns(self.channel.impulse_length_ns))
    }

    /// Starting point of a tuning session.
    pub fn initial_tuning(&self) -> EqTuning {
        let ctle = &self.rx.ctle;
        EqTuning {
            tx_taps: self.tx.taps.clone(),
            ctle: CtleSettings {
                peak_freq: Hertz::from_ghz(ctle.peak_freq_ghz),
                peak_mag_db: ctle.peak_mag_db,
                rx_bw: self.rx.bandwidth(),
                offset_db: ctle.offset_db,
                mode: ctle.mode,
            },
            dfe: DfeSettings {
                enabled: self.dfe.enabled,
                n_taps: self.dfe.n_taps,
            },
        }
    }

    /// Check every setting that would make the session meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        let sim = &self.simulation;
        if !(sim.bit_rate_gbps > 0.0) {
            return Err(ConfigError::invalid(format!(
                "bit rate must be positive, got {} Gb/s",
                sim.bit_rate_gbps
            )));
        }
        if sim.nspb < 2 {
            return Err(ConfigError::invalid(format!(
                "need at least 2 samples per bit, got {}",
                sim.nspb
            )));
        }
        if sim.nbits < 4 {
            return Err(ConfigError::invalid(format!(
                "need at least 4 bits, got {}",
                sim.nbits
            )));
        }

        let ch = &self.channel;
        for (name, value) in [("channel z0", ch.z0), ("channel v0", ch.v0), ("channel w0", ch.w0)] {
            if !(value > 0.0) {
                return Err(ConfigError::invalid(format!("{} must be positive, got {}", name, value)));
            }
        }
        for (name, value) in [
            ("channel rdc", ch.rdc),
            ("channel r0", ch.r0),
            ("channel theta0", ch.theta0),
            ("channel length", ch.length_m),
            ("impulse length", ch.impulse_length_ns),
            ("tx rs", self.tx.rs),
            ("tx cout", self.tx.cout_pf),
            ("rx rin", self.rx.rin),
            ("rx cin", self.rx.cin_pf),
            ("rx cac", self.rx.cac_uf),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::invalid(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        if !(self.rx.cac_uf > 0.0) {
            return Err(ConfigError::invalid("AC coupling capacitance must be positive"));
        }

        let opt = &self.optimizer;
        if !(opt.max_ctle_peak_db >= 0.0) {
            return Err(ConfigError::invalid("maximum CTLE peak must be non-negative"));
        }
        if !(opt.tap_budget > 0.0) {
            return Err(ConfigError::invalid("tap budget must be positive"));
        }

        self.initial_tuning().validate(opt.max_ctle_peak_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_twisted_pair_link() {
        let cfg = LinkConfig::default();

        assert_eq!(cfg.simulation.bit_rate_gbps, 10.0);
        assert_eq!(cfg.simulation.nspb, 32);
        assert_eq!(cfg.channel.rdc, 0.1876);
        assert_eq!(cfg.channel.z0, 100.0);
        assert_eq!(cfg.tx.taps.len(), 4);
        assert!(cfg.tx.taps[0].enabled);
        assert!(cfg.tx.taps[1..].iter().all(|t| !t.enabled));
        assert_eq!(cfg.rx.ctle.mode, CtleMode::Off);
        assert!(cfg.dfe.enabled);
        assert_eq!(cfg.optimizer.max_iter, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg: LinkConfig = toml::from_str(
            r#"
            [simulation]
            bit_rate_gbps = 28.0

            [rx.ctle]
            mode = "AGC"
            peak_mag_db = 6.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.simulation.bit_rate_gbps, 28.0);
        assert_eq!(cfg.simulation.nspb, 32);
        assert_eq!(cfg.rx.ctle.mode, CtleMode::Agc);
        assert_eq!(cfg.rx.ctle.peak_freq_ghz, 5.0);
        assert_eq!(cfg.rx.rin, 100.0);
    }

    #[test]
    fn test_initial_tuning_converts_units() {
        let tuning = LinkConfig::default().initial_tuning();

        assert!((tuning.ctle.peak_freq.as_ghz() - 5.0).abs() < 1e-12);
        assert!((tuning.ctle.rx_bw.as_ghz() - 12.0).abs() < 1e-12);
        assert_eq!(tuning.dfe.n_taps, 5);
    }

    #[test]
    fn test_impulse_length_override() {
        let mut cfg = LinkConfig::default();
        assert!(cfg.impulse_length().is_none());

        cfg.channel.impulse_length_ns = 2.0;
        let len = cfg.impulse_length().unwrap();
        assert!((len.as_ns() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut cfg = LinkConfig::default();
        cfg.simulation.nspb = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = LinkConfig::default();
        cfg.rx.ctle.peak_mag_db = 30.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::OutOfRange { .. })));

        let mut cfg = LinkConfig::default();
        cfg.channel.v0 = 0.0;
        assert!(cfg.validate().is_err());
    }
}

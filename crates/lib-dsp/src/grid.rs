//! Simulation time and frequency grid.

use lib_types::{ConfigError, ConfigResult, Modulation, Seconds, SimulationParams};
use std::f64::consts::PI;

/// Uniform time grid and the matching non-shifted FFT frequency grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationGrid {
    /// Unit interval.
    pub ui: Seconds,

    /// Samples per unit interval.
    pub nspui: usize,

    /// Number of unit intervals.
    pub nui: usize,
}

impl SimulationGrid {
    pub fn new(ui: Seconds, nspui: usize, nui: usize) -> ConfigResult<Self> {
        if !(ui.0 > 0.0) {
            return Err(ConfigError::invalid(format!("unit interval must be positive, got {:?}", ui)));
        }
        if nspui < 2 || nui < 2 {
            return Err(ConfigError::invalid(format!(
                "grid needs at least 2 samples per UI and 2 UIs, got {} x {}",
                nspui, nui
            )));
        }
        Ok(Self { ui, nspui, nui })
    }

    /// Grid for a bit rate and modulation.
    ///
    /// PAM4 carries two bits per symbol: the unit interval and samples per
    /// UI double and the symbol count halves.
    pub fn from_params(params: &SimulationParams) -> ConfigResult<Self> {
        if !(params.bit_rate_gbps > 0.0) {
            return Err(ConfigError::invalid(format!(
                "bit rate must be positive, got {} Gb/s",
                params.bit_rate_gbps
            )));
        }
        let bit_time = params.bit_rate().bit_time();
        let (ui, nspui, nui) = match params.modulation {
            Modulation::Pam4 => (bit_time * 2.0, params.nspb * 2, params.nbits / 2),
            Modulation::Nrz | Modulation::Duobinary => (bit_time, params.nspb, params.nbits),
        };
        Self::new(ui, nspui, nui)
    }

    /// Sample period.
    #[inline]
    pub fn ts(&self) -> Seconds {
        self.ui / self.nspui as f64
    }

    #[inline]
    pub fn npts(&self) -> usize {
        self.nui * self.nspui
    }

    /// Time vector.
    pub fn t(&self) -> Vec<f64> {
        let ts = self.ts().0;
        (0..self.npts()).map(|i| i as f64 * ts).collect()
    }

    /// Frequency spacing of the FFT grid.
    #[inline]
    pub fn f0(&self) -> f64 {
        1.0 / (self.ts().0 * self.npts() as f64)
    }

    /// Frequency vector in non-shifted FFT order:
    /// `[0, f0, ..., fN] ++ [-(fN - f0), ..., -f0]` with `fN = f0 * (npts / 2)`.
    pub fn f(&self) -> Vec<f64> {
        let npts = self.npts();
        let f0 = self.f0();
        let half = npts / 2;

        (0..=half)
            .map(|i| i as f64 * f0)
            .chain((1..npts - half).map(|i| (i as f64 - (npts - half) as f64) * f0))
            .collect()
    }

    /// Non-negative half of the frequency vector (`npts / 2 + 1` points).
    pub fn f_half(&self) -> Vec<f64> {
        let f0 = self.f0();
        (0..=self.npts() / 2).map(|i| i as f64 * f0).collect()
    }

    /// Angular frequency vector, same ordering as [`SimulationGrid::f`].
    pub fn w(&self) -> Vec<f64> {
        self.f().into_iter().map(|f| 2.0 * PI * f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid() {
        let grid = SimulationGrid::from_params(&SimulationParams::default()).unwrap();

        assert_eq!(grid.nspui, 32);
        assert_eq!(grid.nui, 8000);
        assert_eq!(grid.npts(), 256_000);
        assert!((grid.ts().as_ps() - 3.125).abs() < 1e-9);
    }

    #[test]
    fn test_pam4_doubles_ui() {
        let params = SimulationParams {
            modulation: Modulation::Pam4,
            ..SimulationParams::default()
        };
        let grid = SimulationGrid::from_params(&params).unwrap();

        assert!((grid.ui.as_ps() - 200.0).abs() < 1e-9);
        assert_eq!(grid.nspui, 64);
        assert_eq!(grid.nui, 4000);
        assert!((grid.ts().as_ps() - 3.125).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_order_even() {
        let grid = SimulationGrid::new(Seconds(4.0), 2, 4).unwrap();
        // ts = 2, npts = 8, f0 = 1/16
        let f: Vec<f64> = grid.f().iter().map(|v| v * 16.0).collect();
        assert_eq!(f, vec![0.0, 1.0, 2.0, 3.0, 4.0, -3.0, -2.0, -1.0]);
        assert_eq!(grid.f_half().len(), 5);
    }

    #[test]
    fn test_frequency_order_odd() {
        let grid = SimulationGrid::new(Seconds(3.0), 3, 3).unwrap();
        // ts = 1, npts = 9, f0 = 1/9
        let f: Vec<f64> = grid.f().iter().map(|v| (v * 9.0).round()).collect();
        assert_eq!(f, vec![0.0, 1.0, 2.0, 3.0, 4.0, -4.0, -3.0, -2.0, -1.0]);
    }

    #[test]
    fn test_rejects_degenerate_grid() {
        assert!(SimulationGrid::new(Seconds(1e-10), 1, 100).is_err());
        assert!(SimulationGrid::new(Seconds(0.0), 32, 100).is_err());
    }
}

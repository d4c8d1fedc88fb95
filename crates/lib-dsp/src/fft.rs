//! FFT/IFFT operations using rustfft and realfft.
//!
//! Simulation grids are `nui * nspui` points long, which is rarely a power
//! of two, so every transform here accepts any nonzero length. Inverse
//! transforms are normalized by `1/N`.

use crate::error::{DspError, DspResult};
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner};
use rustfft::FftPlanner;
use std::sync::Arc;

/// FFT engine with cached planners.
pub struct FftEngine {
    complex_planner: FftPlanner<f64>,
    real_planner: RealFftPlanner<f64>,
}

impl FftEngine {
    pub fn new() -> Self {
        Self {
            complex_planner: FftPlanner::new(),
            real_planner: RealFftPlanner::new(),
        }
    }

    /// Forward FFT on complex data in-place.
    pub fn fft_inplace(&mut self, data: &mut [Complex64]) -> DspResult<()> {
        let len = data.len();
        if len == 0 {
            return Err(DspError::InvalidFftSize(len));
        }

        let fft = self.complex_planner.plan_fft_forward(len);
        fft.process(data);
        Ok(())
    }

    /// Inverse FFT on complex data in-place.
    pub fn ifft_inplace(&mut self, data: &mut [Complex64]) -> DspResult<()> {
        let len = data.len();
        if len == 0 {
            return Err(DspError::InvalidFftSize(len));
        }

        let fft = self.complex_planner.plan_fft_inverse(len);
        fft.process(data);

        let scale = 1.0 / len as f64;
        for x in data.iter_mut() {
            *x *= scale;
        }

        Ok(())
    }

    pub fn fft(&mut self, data: &[Complex64]) -> DspResult<Vec<Complex64>> {
        let mut result = data.to_vec();
        self.fft_inplace(&mut result)?;
        Ok(result)
    }

    pub fn ifft(&mut self, data: &[Complex64]) -> DspResult<Vec<Complex64>> {
        let mut result = data.to_vec();
        self.ifft_inplace(&mut result)?;
        Ok(result)
    }

    /// Real part of the inverse FFT of a full-length spectrum.
    pub fn ifft_real(&mut self, spectrum: &[Complex64]) -> DspResult<Vec<f64>> {
        Ok(self.ifft(spectrum)?.into_iter().map(|c| c.re).collect())
    }

    /// Plan an inverse real transform of `output_len` points.
    pub fn plan_irfft(&mut self, output_len: usize) -> DspResult<Arc<dyn ComplexToReal<f64>>> {
        if output_len == 0 {
            return Err(DspError::InvalidFftSize(output_len));
        }
        Ok(self.real_planner.plan_fft_inverse(output_len))
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Inverse complex-to-real FFT with a prepared plan.
///
/// `half` holds the non-negative-frequency bins (`N/2 + 1` of them). The
/// imaginary parts of the DC bin (and of the Nyquist bin for even `N`) are
/// dropped, which is what taking the real part of a full complex inverse
/// transform does to them.
pub fn irfft_with(plan: &dyn ComplexToReal<f64>, half: &[Complex64]) -> DspResult<Vec<f64>> {
    let output_len = plan.len();
    let expected = output_len / 2 + 1;
    if half.len() != expected {
        return Err(DspError::LengthMismatch {
            expected,
            actual: half.len(),
        });
    }

    let mut input = half.to_vec();
    input[0].im = 0.0;
    if output_len % 2 == 0 {
        input[expected - 1].im = 0.0;
    }
    let mut output = plan.make_output_vec();

    plan.process(&mut input, &mut output)
        .map_err(|e| DspError::NumericalInstability(e.to_string()))?;

    let scale = 1.0 / output_len as f64;
    for x in output.iter_mut() {
        *x *= scale;
    }

    Ok(output)
}

//! Linear convolution.
//!
//! Response composition convolves a few thousand samples against a few
//! thousand, once per objective evaluation. Short operands go through the
//! direct sum; everything else through a single zero-padded FFT.

use crate::error::DspResult;
use crate::fft::FftEngine;
use num_complex::Complex64;

/// Below this many multiply-adds the direct sum wins.
const DIRECT_WORK_LIMIT: usize = 1 << 16;

/// Full linear convolution, choosing the cheaper method.
///
/// Output length is `signal.len() + kernel.len() - 1`; an empty operand
/// yields an empty result.
pub fn convolve(signal: &[f64], kernel: &[f64]) -> DspResult<Vec<f64>> {
    if signal.is_empty() || kernel.is_empty() {
        return Ok(Vec::new());
    }
    if signal.len().min(kernel.len()) <= 64
        || signal.len().saturating_mul(kernel.len()) <= DIRECT_WORK_LIMIT
    {
        Ok(direct_convolve(signal, kernel))
    } else {
        fft_convolve(signal, kernel)
    }
}

/// Direct (time-domain) convolution.
pub fn direct_convolve(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }
    let output_len = signal.len() + kernel.len() - 1;
    let mut output = vec![0.0; output_len];

    for (i, &s) in signal.iter().enumerate() {
        if s == 0.0 {
            continue;
        }
        for (j, &k) in kernel.iter().enumerate() {
            output[i + j] += s * k;
        }
    }

    output
}

/// FFT-based convolution (single chunk, power-of-two padding).
pub fn fft_convolve(signal: &[f64], kernel: &[f64]) -> DspResult<Vec<f64>> {
    if signal.is_empty() || kernel.is_empty() {
        return Ok(Vec::new());
    }
    let output_len = signal.len() + kernel.len() - 1;
    let fft_size = output_len.next_power_of_two();

    let mut engine = FftEngine::new();

    let mut signal_fft: Vec<Complex64> = signal
        .iter()
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    signal_fft.resize(fft_size, Complex64::new(0.0, 0.0));

    let mut kernel_fft: Vec<Complex64> = kernel
        .iter()
        .map(|&v| Complex64::new(v, 0.0))
        .collect();
    kernel_fft.resize(fft_size, Complex64::new(0.0, 0.0));

    engine.fft_inplace(&mut signal_fft)?;
    engine.fft_inplace(&mut kernel_fft)?;

    for (s, k) in signal_fft.iter_mut().zip(kernel_fft.iter()) {
        *s *= *k;
    }

    engine.ifft_inplace(&mut signal_fft)?;

    Ok(signal_fft[..output_len].iter().map(|c| c.re).collect())
}

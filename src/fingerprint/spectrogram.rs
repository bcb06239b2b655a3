//! Spectral extraction.
//!
//! Splits a PCM buffer into Hamming-windowed frames at a fixed hop and
//! computes the FFT magnitude spectrum of each, yielding the frame-major
//! spectrogram the peak detector scans.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Compute the magnitude spectrogram of a mono sample buffer.
///
/// Emits `(len - window) / hop + 1` frames of `window / 2` bins each; a
/// buffer shorter than one window yields no frames. The trailing partial
/// frame is discarded rather than zero-padded. Magnitudes are raw
/// (no log scaling, no normalization).
pub fn spectrogram(samples: &[f32], config: &EngineConfig) -> Result<Vec<Vec<f64>>, EngineError> {
    let window_size = config.window_size;
    if !window_size.is_power_of_two() {
        return Err(EngineError::WindowNotPowerOfTwo(window_size));
    }
    if samples.len() < window_size {
        return Ok(Vec::new());
    }

    let num_frames = (samples.len() - window_size) / config.hop_size + 1;
    let window = hamming_window(window_size);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(window_size);

    let frames = (0..num_frames)
        .into_par_iter()
        .map(|frame| {
            let offset = frame * config.hop_size;
            let mut buffer: Vec<Complex<f64>> = samples[offset..offset + window_size]
                .iter()
                .zip(&window)
                .map(|(&s, &w)| Complex { re: s as f64 * w, im: 0.0 })
                .collect();

            fft.process(&mut buffer);

            buffer[..window_size / 2]
                .iter()
                .map(|c| (c.re * c.re + c.im * c.im).sqrt())
                .collect()
        })
        .collect();

    Ok(frames)
}

/// Hamming window coefficients for a frame of `size` samples.
fn hamming_window(size: usize) -> Vec<f64> {
    let n = (size - 1) as f64;
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / n).cos())
        .collect()
}

//! Constellation peak detection.
//!
//! Scans the spectrogram band by band for local maxima that clear an
//! absolute magnitude floor. The banded search keeps peaks spread across
//! the spectrum instead of clustering around the loudest region, and the
//! outermost band edges discard sub-bass rumble and high-frequency content
//! that survives poorly in noisy queries.

use crate::config::EngineConfig;

/// A spectral peak in the time-frequency plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    /// Frame index.
    pub time: usize,
    /// Frequency bin.
    pub freq: usize,
}

/// Detect spectral peaks in a frame-major magnitude spectrogram.
///
/// Emission order is frames ascending, bands ascending, bins ascending;
/// the hasher relies on this order being stable.
pub fn find_peaks(spectrogram: &[Vec<f64>], config: &EngineConfig) -> Vec<Peak> {
    if spectrogram.is_empty() {
        return Vec::new();
    }

    let num_frames = spectrogram.len();
    let num_bins = spectrogram[0].len();

    let band_bins: Vec<usize> = config
        .frequency_bands
        .iter()
        .map(|&hz| config.freq_to_bin(hz))
        .collect();

    let mut peaks = Vec::new();

    for t in 0..num_frames {
        for band in band_bins.windows(2) {
            let start = band[0];
            let end = band[1].min(num_bins);

            for f in start..end {
                let magnitude = spectrogram[t][f];
                if magnitude > config.peak_threshold
                    && is_local_maximum(spectrogram, t, f, config.peak_neighborhood)
                {
                    peaks.push(Peak { time: t, freq: f });
                }
            }
        }
    }

    peaks
}

/// A point survives unless some neighbor in the radius-`radius` square
/// around it (center excluded, clipped to the array bounds) is strictly
/// greater. Ties qualify.
fn is_local_maximum(spectrogram: &[Vec<f64>], t: usize, f: usize, radius: usize) -> bool {
    let value = spectrogram[t][f];
    let num_frames = spectrogram.len();
    let num_bins = spectrogram[0].len();

    let t_lo = t.saturating_sub(radius);
    let t_hi = (t + radius).min(num_frames - 1);
    let f_lo = f.saturating_sub(radius);
    let f_hi = (f + radius).min(num_bins - 1);

    for nt in t_lo..=t_hi {
        for nf in f_lo..=f_hi {
            if nt == t && nf == f {
                continue;
            }
            if spectrogram[nt][nf] > value {
                return false;
            }
        }
    }

    true
}

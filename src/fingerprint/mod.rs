//! Fingerprint pipeline glue.
//!
//! Wires framing, spectral analysis, peak detection and hashing together to
//! produce the landmark hashes for one sample buffer.

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::FingerprintHash;

pub mod hashing;
pub mod peaks;
pub mod spectrogram;

/// Run the end-to-end fingerprint pipeline on a mono sample buffer.
///
/// Pass `song_id = None` for query audio. Buffers shorter than one window
/// yield an empty hash list, not an error.
pub fn generate_fingerprints(
    samples: &[f32],
    song_id: Option<Uuid>,
    config: &EngineConfig,
) -> Result<Vec<FingerprintHash>, EngineError> {
    let spectrogram = spectrogram::spectrogram(samples, config)?;
    let peaks = peaks::find_peaks(&spectrogram, config);

    Ok(hashing::generate_hashes(&peaks, song_id, config))
}

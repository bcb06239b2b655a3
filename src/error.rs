use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the fingerprinting and matching pipelines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The buffer cannot be indexed: it is shorter than one FFT window.
    #[error("audio buffer too short to fingerprint: {got} samples, need at least {need}")]
    BufferTooShort { got: usize, need: usize },

    /// The configured FFT window length is invalid.
    #[error("FFT window size {0} is not a power of two")]
    WindowNotPowerOfTwo(usize),

    /// The posting store failed; surfaced verbatim, the caller decides
    /// whether to retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

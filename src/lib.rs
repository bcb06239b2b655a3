//! Landmark-pair audio fingerprinting and identification.
//!
//! A library of reference recordings is reduced to spectral landmarks
//! (constellation peaks), pairs of which are packed into 64-bit hashes and
//! stored in an inverted index. A short, possibly noisy query clip is run
//! through the same pipeline and matched back to its source recording by
//! voting over time-offset differences.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod models;
pub mod server;
pub mod store;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use models::{FingerprintHash, MatchResult, Song};
pub use store::{memory::MemoryStore, sqlite::SqliteStore, PostingStore};

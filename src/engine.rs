//! Ingest and identification pipelines.
//!
//! Wires the fingerprint pipeline to a posting store. The engine owns one
//! immutable configuration; every spectrogram, peak set and hash list is
//! private to the operation that produced it, so independent ingests may
//! run concurrently whenever the store tolerates concurrent writers.

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fingerprint::generate_fingerprints;
use crate::matcher;
use crate::models::{MatchResult, Posting, Song};
use crate::store::PostingStore;

/// Metadata supplied when indexing a recording.
#[derive(Debug, Clone)]
pub struct SongMeta {
    pub title: String,
    pub artist: String,
    pub file_path: String,
}

pub struct Engine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: PostingStore> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Engine { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fingerprint a recording and add it to the catalog.
    ///
    /// The buffer must be mono at the configured sample rate and at least
    /// one FFT window long; shorter buffers are malformed input. Any
    /// failure aborts the ingest, and the store's per-song atomicity
    /// guarantees no partial postings remain.
    pub async fn add_song(&self, meta: SongMeta, samples: &[f32]) -> Result<Song, EngineError> {
        if samples.len() < self.config.window_size {
            return Err(EngineError::BufferTooShort {
                got: samples.len(),
                need: self.config.window_size,
            });
        }

        let duration = samples.len() as f64 / self.config.sample_rate as f64;
        let song = Song::new(meta.title, meta.artist, meta.file_path, duration);

        let fingerprints = generate_fingerprints(samples, Some(song.id), &self.config)?;
        let postings: Vec<Posting> = fingerprints
            .iter()
            .map(|f| Posting { hash: f.hash, anchor_time: f.anchor_time })
            .collect();

        self.store.insert_song(&song).await?;
        self.store.insert_postings(song.id, &postings).await?;

        info!(
            song_id = %song.id,
            title = %song.title,
            postings = postings.len(),
            "indexed song"
        );
        Ok(song)
    }

    /// Match a query buffer against the catalog.
    ///
    /// Returns candidates sorted by confidence; an empty ranking means no
    /// song cleared the matching thresholds, which is not an error. Short
    /// or silent buffers simply produce no candidates.
    pub async fn identify(&self, samples: &[f32]) -> Result<Vec<MatchResult>, EngineError> {
        let fingerprints = generate_fingerprints(samples, None, &self.config)?;
        if fingerprints.is_empty() {
            debug!("query produced no fingerprints");
            return Ok(Vec::new());
        }

        // The store is queried with the distinct hash set, in first-seen
        // order so lookups are reproducible.
        let mut seen = std::collections::HashSet::new();
        let hashes: Vec<u64> = fingerprints
            .iter()
            .map(|f| f.hash)
            .filter(|h| seen.insert(*h))
            .collect();

        let matches_by_song = self.store.lookup(&hashes).await?;
        let ranked = matcher::rank_candidates(&fingerprints, &matches_by_song, &self.config);
        debug!(
            query_hashes = fingerprints.len(),
            candidates = ranked.len(),
            "ranked query"
        );

        let mut results = Vec::with_capacity(ranked.len());
        for m in ranked {
            match self.store.get_song(m.song_id).await? {
                Some(song) => results.push(MatchResult {
                    song,
                    confidence: m.confidence,
                    match_count: m.match_count,
                    offset: m.offset,
                }),
                // Cascade deletion makes this unreachable in practice.
                None => warn!(song_id = %m.song_id, "posting references missing song"),
            }
        }

        Ok(results)
    }

    /// The best `n` matches for a query buffer.
    pub async fn identify_top(&self, samples: &[f32], n: usize) -> Result<Vec<MatchResult>, EngineError> {
        let mut results = self.identify(samples).await?;
        results.truncate(n);
        Ok(results)
    }
}

//! The posting store: the inverted index from hash to postings, plus the
//! song catalog.
//!
//! The rest of the engine is pure and synchronous; the store is the one
//! component allowed to block, so its contract is async. Backends must keep
//! multiset semantics (a posting stored twice comes back twice) and make
//! `insert_postings` atomic per song: a failed bulk insert leaves no
//! partial postings behind.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Posting, Song};

pub mod memory;
pub mod sqlite;

/// Backend failures, surfaced verbatim. The core has no retry policy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt song id in storage: {0}")]
    CorruptId(#[from] uuid::Error),
}

/// Persistence contract for songs and their landmark postings.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Persist a song's metadata.
    async fn insert_song(&self, song: &Song) -> Result<(), StoreError>;

    /// Bulk-append postings for one song. Atomic at song granularity.
    async fn insert_postings(&self, song_id: Uuid, postings: &[Posting]) -> Result<(), StoreError>;

    /// Return every posting whose hash appears in `hashes`, grouped by
    /// song. Multiplicity is preserved.
    async fn lookup(&self, hashes: &[u64]) -> Result<HashMap<Uuid, Vec<Posting>>, StoreError>;

    async fn get_song(&self, song_id: Uuid) -> Result<Option<Song>, StoreError>;

    async fn list_songs(&self) -> Result<Vec<Song>, StoreError>;

    async fn count_songs(&self) -> Result<u64, StoreError>;

    async fn count_postings(&self) -> Result<u64, StoreError>;

    /// Remove every song and, by cascade, every posting.
    async fn clear(&self) -> Result<(), StoreError>;
}

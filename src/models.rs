use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference recording in the catalog. Immutable after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub file_path: String,
    /// Duration in seconds.
    pub duration: f64,
}

impl Song {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, file_path: impl Into<String>, duration: f64) -> Self {
        Song {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
            file_path: file_path.into(),
            duration,
        }
    }
}

/// One landmark hash emitted by the pipeline.
///
/// `song_id` is `None` for query audio; ingest fills in the id of the song
/// being indexed. It never influences the hash value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintHash {
    pub hash: u64,
    /// Frame index of the anchor peak, song-local for ingest and
    /// query-local for queries.
    pub anchor_time: u32,
    pub song_id: Option<Uuid>,
}

/// One stored occurrence of a hash in a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub hash: u64,
    pub anchor_time: u32,
}

/// A ranked identification candidate.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub song: Song,
    /// Fraction of query hashes consistent with the winning alignment,
    /// clamped to [0, 1].
    pub confidence: f64,
    /// Number of postings that matched the query's hash set.
    pub match_count: usize,
    /// Winning time offset in frames: where the query sits inside the song.
    pub offset: i64,
}

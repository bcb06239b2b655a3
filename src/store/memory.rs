//! In-memory posting store.
//!
//! The test double the engine is developed against; also handy for
//! short-lived catalogs. A single mutex guards both relations, which makes
//! every operation trivially atomic.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Posting, Song};
use crate::store::{PostingStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    songs: HashMap<Uuid, Song>,
    /// hash -> occurrences, in insertion order.
    postings: HashMap<u64, Vec<(Uuid, u32)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostingStore for MemoryStore {
    async fn insert_song(&self, song: &Song) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.songs.insert(song.id, song.clone());
        Ok(())
    }

    async fn insert_postings(&self, song_id: Uuid, postings: &[Posting]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for p in postings {
            inner
                .postings
                .entry(p.hash)
                .or_default()
                .push((song_id, p.anchor_time));
        }
        Ok(())
    }

    async fn lookup(&self, hashes: &[u64]) -> Result<HashMap<Uuid, Vec<Posting>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut by_song: HashMap<Uuid, Vec<Posting>> = HashMap::new();

        for &hash in hashes {
            if let Some(entries) = inner.postings.get(&hash) {
                for &(song_id, anchor_time) in entries {
                    by_song
                        .entry(song_id)
                        .or_default()
                        .push(Posting { hash, anchor_time });
                }
            }
        }

        Ok(by_song)
    }

    async fn get_song(&self, song_id: Uuid) -> Result<Option<Song>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.songs.get(&song_id).cloned())
    }

    async fn list_songs(&self) -> Result<Vec<Song>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut songs: Vec<Song> = inner.songs.values().cloned().collect();
        songs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(songs)
    }

    async fn count_songs(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.songs.len() as u64)
    }

    async fn count_postings(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.postings.values().map(|v| v.len() as u64).sum())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.postings.clear();
        inner.songs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(hash: u64, anchor_time: u32) -> Posting {
        Posting { hash, anchor_time }
    }

    #[tokio::test]
    async fn lookup_returns_inserted_postings_grouped_by_song() {
        let store = MemoryStore::new();
        let song = Song::new("t", "a", "p", 1.0);
        store.insert_song(&song).await.unwrap();

        let postings = vec![posting(1, 10), posting(2, 20), posting(1, 30)];
        store.insert_postings(song.id, &postings).await.unwrap();

        let found = store.lookup(&[1, 2, 99]).await.unwrap();
        assert_eq!(found.len(), 1);
        let got = &found[&song.id];
        assert_eq!(got.len(), 3);
        assert!(got.contains(&posting(1, 10)));
        assert!(got.contains(&posting(1, 30)));
        assert!(got.contains(&posting(2, 20)));
    }

    #[tokio::test]
    async fn duplicates_are_preserved_as_a_multiset() {
        let store = MemoryStore::new();
        let song = Song::new("t", "a", "p", 1.0);
        store.insert_song(&song).await.unwrap();

        let postings = vec![posting(7, 5), posting(7, 5)];
        store.insert_postings(song.id, &postings).await.unwrap();

        let found = store.lookup(&[7]).await.unwrap();
        assert_eq!(found[&song.id], vec![posting(7, 5), posting(7, 5)]);
        assert_eq!(store.count_postings().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lookup_of_unknown_hashes_is_empty() {
        let store = MemoryStore::new();
        assert!(store.lookup(&[1, 2, 3]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_songs_and_postings() {
        let store = MemoryStore::new();
        let song = Song::new("t", "a", "p", 1.0);
        store.insert_song(&song).await.unwrap();
        store.insert_postings(song.id, &[posting(1, 0)]).await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.count_songs().await.unwrap(), 0);
        assert_eq!(store.count_postings().await.unwrap(), 0);
        assert!(store.list_songs().await.unwrap().is_empty());
        assert!(store.get_song(song.id).await.unwrap().is_none());
    }
}

//! SQLite-backed posting store.
//!
//! Two relations: `songs` and `postings`, with a hash index on postings and
//! cascade deletion from songs. Hashes are stored as their two's-complement
//! `i64` image and mapped back on read.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::models::{Posting, Song};
use crate::store::{PostingStore, StoreError};

/// Rows per INSERT statement when bulk-loading postings.
const INSERT_CHUNK: usize = 1000;
/// Hashes per IN clause when looking up.
const LOOKUP_CHUNK: usize = 500;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite:earmark.db`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Self::init_schema(&pool).await?;
        Ok(SqliteStore { pool })
    }

    /// An isolated in-memory database, one connection so it stays alive.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(SqliteStore { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS songs (
                id        TEXT PRIMARY KEY,
                title     TEXT NOT NULL,
                artist    TEXT NOT NULL,
                file_path TEXT NOT NULL,
                duration  REAL NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS postings (
                hash        INTEGER NOT NULL,
                anchor_time INTEGER NOT NULL,
                song_id     TEXT NOT NULL REFERENCES songs(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_postings_hash ON postings(hash)")
            .execute(pool)
            .await?;

        Ok(())
    }

    fn song_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Song, StoreError> {
        let id: String = row.get("id");
        Ok(Song {
            id: Uuid::parse_str(&id)?,
            title: row.get("title"),
            artist: row.get("artist"),
            file_path: row.get("file_path"),
            duration: row.get("duration"),
        })
    }
}

#[async_trait]
impl PostingStore for SqliteStore {
    async fn insert_song(&self, song: &Song) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO songs (id, title, artist, file_path, duration) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(song.id.to_string())
        .bind(&song.title)
        .bind(&song.artist)
        .bind(&song.file_path)
        .bind(song.duration)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_postings(&self, song_id: Uuid, postings: &[Posting]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let song_id = song_id.to_string();

        for chunk in postings.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO postings (hash, anchor_time, song_id) ");
            builder.push_values(chunk, |mut row, p| {
                row.push_bind(p.hash as i64)
                    .push_bind(p.anchor_time as i64)
                    .push_bind(song_id.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn lookup(&self, hashes: &[u64]) -> Result<HashMap<Uuid, Vec<Posting>>, StoreError> {
        let mut by_song: HashMap<Uuid, Vec<Posting>> = HashMap::new();

        for chunk in hashes.chunks(LOOKUP_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT hash, anchor_time, song_id FROM postings WHERE hash IN (");
            let mut separated = builder.separated(", ");
            for &hash in chunk {
                separated.push_bind(hash as i64);
            }
            builder.push(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in rows {
                let hash: i64 = row.get("hash");
                let anchor_time: i64 = row.get("anchor_time");
                let song_id: String = row.get("song_id");

                by_song
                    .entry(Uuid::parse_str(&song_id)?)
                    .or_default()
                    .push(Posting {
                        hash: hash as u64,
                        anchor_time: anchor_time as u32,
                    });
            }
        }

        Ok(by_song)
    }

    async fn get_song(&self, song_id: Uuid) -> Result<Option<Song>, StoreError> {
        let row = sqlx::query("SELECT id, title, artist, file_path, duration FROM songs WHERE id = ?")
            .bind(song_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::song_from_row).transpose()
    }

    async fn list_songs(&self) -> Result<Vec<Song>, StoreError> {
        let rows = sqlx::query("SELECT id, title, artist, file_path, duration FROM songs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::song_from_row).collect()
    }

    async fn count_songs(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_postings(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM postings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM postings").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM songs").execute(&mut *tx).await?;
        tx.commit().await?;
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
    async fn roundtrip_song_and_postings() {
        let store = SqliteStore::in_memory().await.unwrap();
        let song = Song::new("Title", "Artist", "/tmp/x.wav", 3.5);
        store.insert_song(&song).await.unwrap();

        let postings = vec![posting(1, 10), posting(2, 20), posting(1, 10)];
        store.insert_postings(song.id, &postings).await.unwrap();

        assert_eq!(store.count_songs().await.unwrap(), 1);
        assert_eq!(store.count_postings().await.unwrap(), 3);

        let found = store.lookup(&[1, 2]).await.unwrap();
        let got = &found[&song.id];
        assert_eq!(got.len(), 3);
        assert_eq!(got.iter().filter(|p| **p == posting(1, 10)).count(), 2);

        let loaded = store.get_song(song.id).await.unwrap().unwrap();
        assert_eq!(loaded, song);
    }

    #[tokio::test]
    async fn high_bit_hashes_survive_the_i64_boundary() {
        let store = SqliteStore::in_memory().await.unwrap();
        let song = Song::new("t", "a", "p", 1.0);
        store.insert_song(&song).await.unwrap();

        let hash = (0xFFFFu64 << 48) | 42; // negative as i64
        store.insert_postings(song.id, &[posting(hash, 7)]).await.unwrap();

        let found = store.lookup(&[hash]).await.unwrap();
        assert_eq!(found[&song.id], vec![posting(hash, 7)]);
    }

    #[tokio::test]
    async fn clear_cascades_and_forgets_song_ids() {
        let store = SqliteStore::in_memory().await.unwrap();
        let song = Song::new("t", "a", "p", 1.0);
        store.insert_song(&song).await.unwrap();
        store.insert_postings(song.id, &[posting(5, 0)]).await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.count_songs().await.unwrap(), 0);
        assert_eq!(store.count_postings().await.unwrap(), 0);
        assert!(store.get_song(song.id).await.unwrap().is_none());
        assert!(store.list_songs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn postings_require_an_existing_song() {
        let store = SqliteStore::in_memory().await.unwrap();
        let orphan = Uuid::new_v4();

        let err = store.insert_postings(orphan, &[posting(1, 0)]).await;
        assert!(err.is_err());
        assert_eq!(store.count_postings().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bulk_insert_spans_chunk_boundaries() {
        let store = SqliteStore::in_memory().await.unwrap();
        let song = Song::new("t", "a", "p", 1.0);
        store.insert_song(&song).await.unwrap();

        let postings: Vec<Posting> = (0..2500).map(|i| posting(i as u64, i as u32)).collect();
        store.insert_postings(song.id, &postings).await.unwrap();

        assert_eq!(store.count_postings().await.unwrap(), 2500);
        let found = store.lookup(&[0, 1234, 2499]).await.unwrap();
        assert_eq!(found[&song.id].len(), 3);
    }
}

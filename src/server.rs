//! HTTP surface for the identification service.
//!
//! Thin glue over the engine: multipart uploads in, JSON out. Decoding and
//! fingerprinting are CPU-bound, so handlers push them onto the blocking
//! pool before awaiting the store.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::decode;
use crate::engine::{Engine, SongMeta};
use crate::models::{MatchResult, Song};
use crate::store::sqlite::SqliteStore;
use crate::store::PostingStore;

pub type SharedEngine = Arc<Engine<SqliteStore>>;

type ApiError = (StatusCode, String);

#[derive(Serialize)]
pub struct StatsResponse {
    pub songs: u64,
    pub postings: u64,
}

pub fn router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/songs", post(add_song).get(list_songs))
        .route("/identify", post(identify))
        .route("/stats", get(stats))
        .route("/health", get(|| async { "healthy" }))
        .with_state(engine)
}

/// Index an uploaded recording.
///
/// Expects multipart fields `file`, `title` and `artist`.
async fn add_song(
    State(engine): State<SharedEngine>,
    multipart: Multipart,
) -> Result<Json<Song>, ApiError> {
    let upload = Upload::read(multipart).await?;
    let title = upload.title.clone().unwrap_or_else(|| "unknown".into());
    let artist = upload.artist.clone().unwrap_or_else(|| "unknown".into());

    let samples = decode_upload(upload, engine.config().sample_rate).await?;

    let meta = SongMeta {
        title,
        artist,
        file_path: String::new(),
    };
    let song = engine
        .add_song(meta, &samples)
        .await
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    Ok(Json(song))
}

/// Identify an uploaded clip. Returns the top matches, best first.
async fn identify(
    State(engine): State<SharedEngine>,
    multipart: Multipart,
) -> Result<Json<Vec<MatchResult>>, ApiError> {
    let upload = Upload::read(multipart).await?;
    let samples = decode_upload(upload, engine.config().sample_rate).await?;

    let top = engine.config().top_matches;
    let matches = engine
        .identify_top(&samples, top)
        .await
        .map_err(internal)?;

    Ok(Json(matches))
}

async fn list_songs(State(engine): State<SharedEngine>) -> Result<Json<Vec<Song>>, ApiError> {
    let songs = engine.store().list_songs().await.map_err(internal)?;
    Ok(Json(songs))
}

async fn stats(State(engine): State<SharedEngine>) -> Result<Json<StatsResponse>, ApiError> {
    let songs = engine.store().count_songs().await.map_err(internal)?;
    let postings = engine.store().count_postings().await.map_err(internal)?;
    Ok(Json(StatsResponse { songs, postings }))
}

struct Upload {
    bytes: Vec<u8>,
    title: Option<String>,
    artist: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Upload { bytes: Vec::new(), title: None, artist: None };

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    upload.bytes = field
                        .bytes()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
                        .to_vec();
                }
                "title" => {
                    upload.title = Some(field.text().await.map_err(|e| {
                        (StatusCode::BAD_REQUEST, e.to_string())
                    })?);
                }
                "artist" => {
                    upload.artist = Some(field.text().await.map_err(|e| {
                        (StatusCode::BAD_REQUEST, e.to_string())
                    })?);
                }
                _ => {}
            }
        }

        if upload.bytes.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "missing 'file' field".into()));
        }
        Ok(upload)
    }
}

/// Decode and peak-normalize off the async reactor.
async fn decode_upload(upload: Upload, sample_rate: u32) -> Result<Vec<f32>, ApiError> {
    tokio::task::spawn_blocking(move || {
        decode::decode_to_mono(&upload.bytes, sample_rate).map(|s| decode::normalize(&s))
    })
    .await
    .map_err(internal)?
    .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

//! Identification service binary.
//!
//! Serves the HTTP API over a SQLite-backed catalog. The database location
//! comes from `DATABASE_URL` (default `sqlite:earmark.db`).

use std::sync::Arc;

use earmark::server;
use earmark::{Engine, EngineConfig, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:earmark.db".into());
    let store = SqliteStore::connect(&db_url).await?;
    let engine = Arc::new(Engine::new(store, EngineConfig::default()));

    let app = server::router(engine);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("listening on 0.0.0.0:8080");
    axum::serve(listener, app).await?;

    Ok(())
}

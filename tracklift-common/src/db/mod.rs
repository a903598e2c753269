//! Database access for Tracklift
//!
//! SQLite-backed track record store. The store enforces nothing about
//! ordering: operations on the same track id must be serialized by the
//! caller (single-writer-per-id discipline).

pub mod tracks;

use sqlx::SqlitePool;
use std::path::Path;

use crate::Result;

/// Initialize database connection pool
///
/// Creates the parent directory and the schema if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create pipeline tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            original_path TEXT,
            processed_path TEXT,
            title TEXT,
            artist TEXT,
            album TEXT,
            genre TEXT,
            rating INTEGER,
            year INTEGER,
            duration REAL,
            bpm REAL,
            is_trimmed INTEGER NOT NULL DEFAULT 0,
            trim_settings TEXT,
            source_url TEXT,
            source_type TEXT,
            status TEXT NOT NULL,
            download_progress REAL,
            processing_progress REAL,
            upload_progress REAL,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (tracks)");

    Ok(())
}

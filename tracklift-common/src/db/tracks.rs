//! Track record persistence
//!
//! One row per track; the id is assigned at creation and never reused.
//! Trim settings are stored as a JSON column since they are a value
//! object owned by the track, not an entity of their own.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::types::{Genre, SourceKind, TrackMetadata, TrackStatus, TrimSettings};
use crate::{Error, Result};

/// The central pipeline entity
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub filename: String,
    /// Path of the acquired artifact in the staging area
    pub original_path: Option<String>,
    /// Path of the transformed artifact; only set after a successful
    /// transform
    pub processed_path: Option<String>,
    pub metadata: TrackMetadata,
    pub status: TrackStatus,
    /// Transient stage progress, meaningful only while the matching
    /// status is active
    pub download_progress: Option<f64>,
    pub processing_progress: Option<f64>,
    pub upload_progress: Option<f64>,
    /// Last failure message; cleared on successful retry of the stage
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Track {
    /// Create a new record entering the acquisition stage
    pub fn new(filename: String, metadata: TrackMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            filename,
            original_path: None,
            processed_path: None,
            metadata,
            status: TrackStatus::Downloading,
            download_progress: None,
            processing_progress: None,
            upload_progress: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Progress field selector for [`set_progress`]
#[derive(Debug, Clone, Copy)]
pub enum ProgressKind {
    Download,
    Processing,
    Upload,
}

impl ProgressKind {
    fn column(&self) -> &'static str {
        match self {
            ProgressKind::Download => "download_progress",
            ProgressKind::Processing => "processing_progress",
            ProgressKind::Upload => "upload_progress",
        }
    }
}

/// Insert or update a track record
pub async fn save_track(pool: &SqlitePool, track: &Track) -> Result<()> {
    let trim_json = match &track.metadata.trim_settings {
        Some(settings) => Some(
            serde_json::to_string(settings)
                .map_err(|e| Error::Internal(format!("trim settings serialization: {e}")))?,
        ),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, filename, original_path, processed_path,
            title, artist, album, genre, rating, year,
            duration, bpm, is_trimmed, trim_settings, source_url, source_type,
            status, download_progress, processing_progress, upload_progress,
            error, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            filename = excluded.filename,
            original_path = excluded.original_path,
            processed_path = excluded.processed_path,
            title = excluded.title,
            artist = excluded.artist,
            album = excluded.album,
            genre = excluded.genre,
            rating = excluded.rating,
            year = excluded.year,
            duration = excluded.duration,
            bpm = excluded.bpm,
            is_trimmed = excluded.is_trimmed,
            trim_settings = excluded.trim_settings,
            source_url = excluded.source_url,
            source_type = excluded.source_type,
            status = excluded.status,
            download_progress = excluded.download_progress,
            processing_progress = excluded.processing_progress,
            upload_progress = excluded.upload_progress,
            error = excluded.error,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(track.id.to_string())
    .bind(&track.filename)
    .bind(&track.original_path)
    .bind(&track.processed_path)
    .bind(&track.metadata.title)
    .bind(&track.metadata.artist)
    .bind(&track.metadata.album)
    .bind(track.metadata.genre.map(|g| g.as_str()))
    .bind(track.metadata.rating)
    .bind(track.metadata.year)
    .bind(track.metadata.duration)
    .bind(track.metadata.bpm)
    .bind(track.metadata.is_trimmed)
    .bind(trim_json)
    .bind(&track.metadata.source_url)
    .bind(track.metadata.source_type.map(|s| s.as_str()))
    .bind(track.status.as_str())
    .bind(track.download_progress)
    .bind(track.processing_progress)
    .bind(track.upload_progress)
    .bind(&track.error)
    .bind(track.created_at.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a track by id
pub async fn load_track(pool: &SqlitePool, id: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(track_from_row).transpose()
}

/// Load a track by id, failing with `NotFound` when absent
pub async fn require_track(pool: &SqlitePool, id: Uuid) -> Result<Track> {
    load_track(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("track {id}")))
}

/// List all tracks, newest first
pub async fn list_tracks(pool: &SqlitePool) -> Result<Vec<Track>> {
    let rows = sqlx::query("SELECT * FROM tracks ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(track_from_row).collect()
}

/// Remove a track record
pub async fn delete_track(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM tracks WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Update the status column only
pub async fn update_status(pool: &SqlitePool, id: Uuid, status: TrackStatus) -> Result<()> {
    sqlx::query("UPDATE tracks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Update one of the transient progress columns (best-effort indicators)
pub async fn set_progress(
    pool: &SqlitePool,
    id: Uuid,
    kind: ProgressKind,
    value: Option<f64>,
) -> Result<()> {
    let sql = format!(
        "UPDATE tracks SET {} = ?, updated_at = ? WHERE id = ?",
        kind.column()
    );
    sqlx::query(&sql)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Set or clear the last-failure message
pub async fn set_error(pool: &SqlitePool, id: Uuid, message: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE tracks SET error = ?, updated_at = ? WHERE id = ?")
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn track_from_row(row: SqliteRow) -> Result<Track> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::Internal(format!("invalid track id {id_str}: {e}")))?;

    let status_str: String = row.get("status");
    let status: TrackStatus = status_str.parse()?;

    let genre = row
        .get::<Option<String>, _>("genre")
        .map(|g| g.parse::<Genre>())
        .transpose()?;
    let source_type = row
        .get::<Option<String>, _>("source_type")
        .map(|s| s.parse::<SourceKind>())
        .transpose()?;
    let trim_settings = row
        .get::<Option<String>, _>("trim_settings")
        .map(|json| serde_json::from_str::<TrimSettings>(&json))
        .transpose()
        .map_err(|e| Error::Internal(format!("trim settings deserialization: {e}")))?;

    let created_at = parse_timestamp(row.get("created_at"))?;
    let updated_at = parse_timestamp(row.get("updated_at"))?;

    Ok(Track {
        id,
        filename: row.get("filename"),
        original_path: row.get("original_path"),
        processed_path: row.get("processed_path"),
        metadata: TrackMetadata {
            title: row.get("title"),
            artist: row.get("artist"),
            album: row.get("album"),
            genre,
            rating: row.get("rating"),
            year: row.get("year"),
            duration: row.get("duration"),
            bpm: row.get("bpm"),
            is_trimmed: row.get("is_trimmed"),
            trim_settings,
            source_url: row.get("source_url"),
            source_type,
        },
        status,
        download_progress: row.get("download_progress"),
        processing_progress: row.get("processing_progress"),
        upload_progress: row.get("upload_progress"),
        error: row.get("error"),
        created_at,
        updated_at,
    })
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp {value}: {e}")))
}

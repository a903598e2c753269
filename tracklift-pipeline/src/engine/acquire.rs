//! Acquisition stage
//!
//! Fetches raw media from a source URL and creates the track record.
//! The downloader writes under its own title-derived name into the
//! incoming scratch bucket, which is cleared beforehand so a leftover
//! from a previous run can never be picked up as the result. After a
//! successful run the newest produced file is moved into the downloads
//! bucket under the track id; acquired artifacts therefore never share
//! a directory with tool output and survive later acquisitions.

use sqlx::SqlitePool;
use tracing::{info, warn};
use tracklift_common::db::tracks::{self, ProgressKind, Track};
use tracklift_common::{Config, Error, Result, SourceKind, TrackMetadata, TrackStatus};

use crate::sources;
use crate::storage::{BlobStore, Bucket};
use crate::tempo;
use crate::tools::{downloader, ffmpeg};

/// Acquires tracks from external sources
///
/// Operations on the same track id must be serialized by the caller;
/// concurrent acquisitions against the same staging root are unsupported
/// because artifact discovery scans the shared incoming bucket.
pub struct AcquisitionEngine {
    db: SqlitePool,
    store: BlobStore,
    config: Config,
}

impl AcquisitionEngine {
    pub fn new(db: SqlitePool, store: BlobStore, config: Config) -> Self {
        Self { db, store, config }
    }

    /// Acquire a track from `url`
    ///
    /// On success the record is `downloaded` with `original_path` set and
    /// best-effort duration/bpm enrichment. On failure the record is left
    /// in `error` status with the failure message attached, and the error
    /// is returned to the caller.
    pub async fn acquire(&self, url: &str) -> Result<Track> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidSource(format!("not a valid URL: {url:?}")));
        }

        let kind = sources::classify(url);
        if kind == SourceKind::YandexMusic && sources::extract_id(url).is_none() {
            // Unsupported URL shape; fail fast instead of guessing.
            return Err(Error::InvalidSource(format!(
                "unsupported Yandex Music URL (no numeric track segment): {url}"
            )));
        }

        let mut track = Track::new(
            String::new(),
            TrackMetadata {
                rating: Some(self.config.processing.default_rating),
                year: Some(self.config.processing.default_year),
                source_url: Some(url.to_string()),
                source_type: Some(kind),
                ..Default::default()
            },
        );
        // Placeholder until the downloader's title-derived name is known.
        track.filename = format!("{}.mp3", track.id);
        tracks::save_track(&self.db, &track).await?;
        tracks::set_progress(&self.db, track.id, ProgressKind::Download, Some(0.0)).await?;

        info!(track_id = %track.id, url = url, kind = kind.as_str(), "Acquiring track");

        let location = ffmpeg::locate(&self.config);
        if location.is_none() {
            warn!("ffmpeg not located; downloader may fail to convert audio");
        }

        self.store.clear_stale(Bucket::Incoming, "mp3")?;

        let incoming_dir = self.store.bucket_dir(Bucket::Incoming);
        let download = downloader::download(
            url,
            kind,
            &incoming_dir,
            location.as_ref().map(|l| l.dir.as_path()),
        )
        .await;

        if let Err(e) = download {
            self.record_failure(&mut track, &e).await?;
            return Err(e);
        }

        // Defensive check against silent tool failures: exit code 0 does
        // not guarantee an artifact.
        let produced = match self.store.newest_file(Bucket::Incoming, "mp3")? {
            Some(path) => path,
            None => {
                let e = Error::NoArtifactProduced(
                    "downloader reported success but no audio file appeared in staging"
                        .to_string(),
                );
                self.record_failure(&mut track, &e).await?;
                return Err(e);
            }
        };

        let produced_name = produced
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.mp3", track.id));
        let blob_name = format!("{}.mp3", track.id);
        let artifact = self.store.adopt(&produced, Bucket::Downloads, &blob_name)?;

        track.filename = produced_name.clone();
        track.original_path = Some(BlobStore::blob_ref(Bucket::Downloads, &blob_name));
        if track.metadata.title.is_none() {
            track.metadata.title = produced_name
                .strip_suffix(".mp3")
                .map(|stem| stem.to_string());
        }

        // Best-effort enrichment; never fails the stage.
        if let Some(location) = &location {
            match ffmpeg::probe_duration(location, &artifact).await {
                Ok(duration) => track.metadata.duration = Some(duration),
                Err(e) => warn!(track_id = %track.id, "Duration probe failed: {e}"),
            }
        }
        track.metadata.bpm = tempo::detect_tempo(&artifact, location.as_ref()).await;

        track.status = TrackStatus::Downloaded;
        track.download_progress = Some(100.0);
        track.error = None;
        tracks::save_track(&self.db, &track).await?;

        info!(
            track_id = %track.id,
            file = track.filename,
            bpm = ?track.metadata.bpm,
            "Track acquired"
        );

        Ok(track)
    }

    async fn record_failure(&self, track: &mut Track, error: &Error) -> Result<()> {
        warn!(track_id = %track.id, "Acquisition failed: {error}");
        track.status = TrackStatus::Error;
        track.error = Some(error.to_string());
        tracks::save_track(&self.db, track).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracklift_common::db::init_database_pool;

    async fn engine(dir: &TempDir) -> AcquisitionEngine {
        let pool = init_database_pool(&dir.path().join("test.db")).await.unwrap();
        let store = BlobStore::open(dir.path().join("staging")).unwrap();
        AcquisitionEngine::new(pool, store, Config::default())
    }

    #[tokio::test]
    async fn malformed_url_fails_fast_without_record() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;

        let result = engine.acquire("not-a-url").await;
        assert!(matches!(result, Err(Error::InvalidSource(_))));

        let all = tracks::list_tracks(&engine.db).await.unwrap();
        assert!(all.is_empty(), "no record should be created for bad URLs");
    }

    #[tokio::test]
    async fn yandex_url_without_track_id_is_invalid_source() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;

        let result = engine
            .acquire("https://music.yandex.ru/artist/some-artist")
            .await;
        assert!(matches!(result, Err(Error::InvalidSource(_))));
    }
}

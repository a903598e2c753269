//! Transform stage
//!
//! Applies trim/fade/duration edits to a staged artifact with one ffmpeg
//! invocation, writing the result into the processed bucket. The source
//! artifact is never modified, so re-running a transform with identical
//! settings produces an equivalent new artifact. A separate preview mode
//! writes short-lived artifacts into their own bucket without touching
//! the persisted record.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracklift_common::db::tracks::{self, ProgressKind, Track};
use tracklift_common::{Config, Error, MetadataPatch, Result, TrackStatus, TrimSettings};

use crate::storage::{BlobStore, Bucket};
use crate::tools::ffmpeg::{self, FfmpegLocation, TranscodeJob};

/// Preview artifacts older than this are purged before a new one is made
const PREVIEW_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Computed transcoder parameters for one trim request
///
/// Pure value derived from [`TrimSettings`]; all times in seconds on the
/// source timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimPlan {
    pub start: f64,
    pub duration: f64,
    /// (start, length) of the fade-in, when requested
    pub fade_in: Option<(f64, f64)>,
    /// (start, length) of the fade-out, when requested
    pub fade_out: Option<(f64, f64)>,
}

impl TrimPlan {
    /// Derive the plan from a trim request
    ///
    /// Output duration: `end_time - start_time` when an end is given,
    /// else `max_duration`, else `default_ceiling`. The fade-out starts
    /// `fade_out` seconds before the effective end.
    pub fn from_settings(settings: &TrimSettings, default_ceiling: f64) -> TrimPlan {
        let start = settings.start_time;
        let duration = match settings.end_time {
            Some(end) => end - start,
            None => settings.max_duration.unwrap_or(default_ceiling),
        };

        let fade_in = (settings.fade_in > 0.0).then_some((start, settings.fade_in));

        let fade_out = (settings.fade_out > 0.0).then(|| {
            let end = settings
                .end_time
                .unwrap_or(start + settings.max_duration.unwrap_or(default_ceiling));
            (end - settings.fade_out, settings.fade_out)
        });

        TrimPlan {
            start,
            duration,
            fade_in,
            fade_out,
        }
    }

    /// afade filter chain for the transcoder, `None` when no fades apply
    pub fn filter_chain(&self) -> Option<String> {
        let mut filters = Vec::new();
        if let Some((at, length)) = self.fade_in {
            filters.push(format!("afade=t=in:st={at}:d={length}"));
        }
        if let Some((at, length)) = self.fade_out {
            filters.push(format!("afade=t=out:st={at}:d={length}"));
        }
        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }
}

/// Transforms staged artifacts
///
/// Operations on the same track id must be serialized by the caller.
pub struct TransformEngine {
    db: SqlitePool,
    store: BlobStore,
    config: Config,
}

impl TransformEngine {
    pub fn new(db: SqlitePool, store: BlobStore, config: Config) -> Self {
        Self { db, store, config }
    }

    /// Trim/transcode a track, optionally applying a metadata patch
    ///
    /// Refused unless the track's status admits entering `processing`,
    /// so terminal tracks are never re-transformed. On success
    /// `processed_path` points at the new artifact and status advances
    /// to `trimmed`. On failure the status is left at its previous
    /// value, `error` is populated, and `processed_path` never
    /// references the partial output.
    pub async fn transform(
        &self,
        id: uuid::Uuid,
        settings: TrimSettings,
        patch: Option<&MetadataPatch>,
    ) -> Result<Track> {
        let mut track = tracks::require_track(&self.db, id).await?;
        if !track.status.can_transition_to(TrackStatus::Processing) {
            return Err(Error::TransformFailed(format!(
                "track {id} cannot be transformed from status {}",
                track.status
            )));
        }
        settings.validate()?;

        let input = self.resolve_input(&track)?;
        let location = self.require_transcoder()?;
        let plan = TrimPlan::from_settings(&settings, self.config.processing.max_duration);

        let previous_status = track.status;
        tracks::update_status(&self.db, id, TrackStatus::Processing).await?;
        tracks::set_progress(&self.db, id, ProgressKind::Processing, Some(0.0)).await?;

        let blob_name = format!("{id}.mp3");
        let output = self.store.blob_path(Bucket::Processed, &blob_name);
        let job = self.build_job(input, output, &plan);

        info!(
            track_id = %id,
            start = plan.start,
            duration = plan.duration,
            "Transforming track"
        );

        if let Err(e) = ffmpeg::run_transcode(&location, &job).await {
            // No partial promotion: restore the pre-transform status and
            // drop whatever the tool left behind.
            self.store.delete(Bucket::Processed, &blob_name)?;
            tracks::update_status(&self.db, id, previous_status).await?;
            tracks::set_error(&self.db, id, Some(&e.to_string())).await?;
            return Err(e);
        }

        track.processed_path = Some(BlobStore::blob_ref(Bucket::Processed, &blob_name));
        track.metadata.trim_settings = Some(settings);
        track.metadata.is_trimmed = true;
        track.metadata.duration = Some(plan.duration);
        if let Some(patch) = patch {
            track.metadata.apply(patch);
        }
        track.status = TrackStatus::Trimmed;
        track.processing_progress = Some(100.0);
        track.error = None;
        tracks::save_track(&self.db, &track).await?;

        Ok(track)
    }

    /// Metadata-only update; no transcoder invocation
    ///
    /// Advances `downloaded`/`processing` to `processed`; an already
    /// trimmed track keeps its status.
    pub async fn update_metadata(&self, id: uuid::Uuid, patch: &MetadataPatch) -> Result<Track> {
        let mut track = tracks::require_track(&self.db, id).await?;
        if track.status == TrackStatus::Rejected {
            return Err(Error::TransformFailed(format!(
                "track {id} is rejected and cannot be updated"
            )));
        }

        track.metadata.apply(patch);
        if matches!(
            track.status,
            TrackStatus::Downloaded | TrackStatus::Processing
        ) {
            track.status = TrackStatus::Processed;
        }
        track.error = None;
        tracks::save_track(&self.db, &track).await?;

        Ok(track)
    }

    /// Produce a short-lived preview artifact without mutating the record
    ///
    /// Previews live in their own bucket under a timestamped name; stale
    /// previews are purged opportunistically first.
    pub async fn preview(&self, id: uuid::Uuid, settings: TrimSettings) -> Result<PathBuf> {
        let track = tracks::require_track(&self.db, id).await?;
        if track.status == TrackStatus::Rejected {
            return Err(Error::TransformFailed(format!(
                "track {id} is rejected and has no valid artifact"
            )));
        }
        settings.validate()?;

        let purged = self.store.purge_older_than(Bucket::Previews, PREVIEW_RETENTION)?;
        if purged > 0 {
            info!("Purged {purged} expired preview(s)");
        }

        let input = self.resolve_input(&track)?;
        let location = self.require_transcoder()?;
        let plan = TrimPlan::from_settings(&settings, self.config.processing.max_duration);

        let blob_name = format!("{}-{}.mp3", id, Utc::now().timestamp_millis());
        let output = self.store.blob_path(Bucket::Previews, &blob_name);
        let job = self.build_job(input, output.clone(), &plan);

        ffmpeg::run_transcode(&location, &job).await?;

        Ok(output)
    }

    /// Resolve the source artifact for a transform
    ///
    /// When `original_path` is absent or its file is gone, fall back to
    /// any available audio file in the downloads bucket (degraded-mode
    /// recovery) before giving up.
    fn resolve_input(&self, track: &Track) -> Result<PathBuf> {
        if let Some(blob_ref) = &track.original_path {
            let path = self.store.resolve(blob_ref);
            if path.is_file() {
                return Ok(path);
            }
            warn!(track_id = %track.id, "Artifact {blob_ref} is gone, scanning staging area");
        } else {
            warn!(track_id = %track.id, "Track has no original_path, scanning staging area");
        }

        self.store
            .newest_file(Bucket::Downloads, "mp3")?
            .ok_or_else(|| {
                Error::ArtifactMissing(format!("no source artifact for track {}", track.id))
            })
    }

    fn require_transcoder(&self) -> Result<FfmpegLocation> {
        ffmpeg::locate(&self.config).ok_or_else(|| {
            Error::MissingTranscoder(format!(
                "ffmpeg is required for transforms; install it or set {}",
                ffmpeg::FFMPEG_DIR_ENV
            ))
        })
    }

    fn build_job(&self, input: PathBuf, output: PathBuf, plan: &TrimPlan) -> TranscodeJob {
        TranscodeJob {
            input,
            output,
            start: Some(plan.start),
            duration: Some(plan.duration),
            filters: plan.filter_chain(),
            sample_rate: self.config.audio.sample_rate,
            channels: self.config.audio.channels,
            bitrate: self.config.audio.bitrate.clone(),
        }
    }
}

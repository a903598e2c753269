//! Pipeline stages
//!
//! One engine per stage: acquisition creates a track, transform mutates
//! it (possibly several passes), publish consumes it. Stages never run
//! concurrently on the same track id; the caller decides ordering and
//! the engines enforce precondition checks, not scheduling.
//!
//! Reject and delete live here as explicit external operations: the
//! pipeline itself never removes a track.

pub mod acquire;
pub mod publish;
pub mod transform;

pub use acquire::AcquisitionEngine;
pub use publish::PublishEngine;
pub use transform::{TransformEngine, TrimPlan};

use sqlx::SqlitePool;
use tracing::{info, warn};
use tracklift_common::db::tracks::{self, Track};
use tracklift_common::{Error, Result, TrackStatus};

use crate::storage::{BlobStore, Bucket};

/// Reject a track: its artifacts move to the rejected bucket and the
/// record enters the terminal `rejected` state.
pub async fn reject_track(db: &SqlitePool, store: &BlobStore, id: uuid::Uuid) -> Result<Track> {
    let mut track = tracks::require_track(db, id).await?;
    if !track.status.can_transition_to(TrackStatus::Rejected) {
        return Err(Error::Internal(format!(
            "track {id} cannot be rejected from status {}",
            track.status
        )));
    }

    track.original_path = quarantine(store, track.original_path.take());
    track.processed_path = quarantine(store, track.processed_path.take());
    track.status = TrackStatus::Rejected;
    tracks::save_track(db, &track).await?;

    info!(track_id = %id, "Track rejected");
    Ok(track)
}

/// Delete a track: record and blobs are removed for good.
pub async fn delete_track(db: &SqlitePool, store: &BlobStore, id: uuid::Uuid) -> Result<()> {
    let track = tracks::require_track(db, id).await?;

    for blob_ref in [&track.original_path, &track.processed_path]
        .into_iter()
        .flatten()
    {
        let path = store.resolve(blob_ref);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(track_id = %id, "Could not remove {}: {}", path.display(), e);
            }
        }
    }

    tracks::delete_track(db, id).await?;
    info!(track_id = %id, "Track deleted");
    Ok(())
}

/// Move a referenced blob into the rejected bucket, returning the new
/// reference; a missing blob simply drops the reference.
fn quarantine(store: &BlobStore, blob_ref: Option<String>) -> Option<String> {
    let blob_ref = blob_ref?;
    let path = store.resolve(&blob_ref);
    if !path.is_file() {
        return None;
    }
    let name = path.file_name()?.to_string_lossy().to_string();
    match store.adopt(&path, Bucket::Rejected, &name) {
        Ok(_) => Some(BlobStore::blob_ref(Bucket::Rejected, &name)),
        Err(e) => {
            warn!("Could not quarantine {}: {}", blob_ref, e);
            None
        }
    }
}

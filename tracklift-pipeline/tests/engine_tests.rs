//! Stage precondition and lifecycle tests
//!
//! These run without ffmpeg, yt-dlp or a network: they exercise the
//! guard rails each engine applies before touching any external tool.

use tempfile::TempDir;
use tracklift_common::db::tracks::{self, Track};
use tracklift_common::db::init_database_pool;
use tracklift_common::{Config, Error, FtpConfig, TrackMetadata, TrackStatus, TrimSettings};
use tracklift_pipeline::engine::{self, PublishEngine, TransformEngine};
use tracklift_pipeline::{BlobStore, Bucket};

struct Fixture {
    _dir: TempDir,
    db: sqlx::SqlitePool,
    store: BlobStore,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = init_database_pool(&dir.path().join("test.db")).await.unwrap();
    let store = BlobStore::open(dir.path().join("staging")).unwrap();
    Fixture {
        _dir: dir,
        db,
        store,
    }
}

fn trim() -> TrimSettings {
    TrimSettings {
        start_time: 0.0,
        end_time: Some(30.0),
        max_duration: None,
        fade_in: 0.0,
        fade_out: 0.0,
    }
}

fn ftp() -> FtpConfig {
    FtpConfig {
        host: "ftp.invalid".to_string(),
        user: "radio".to_string(),
        ..Default::default()
    }
}

async fn insert_track(fx: &Fixture, status: TrackStatus) -> Track {
    let mut track = Track::new("song.mp3".to_string(), TrackMetadata::default());
    track.status = status;
    tracks::save_track(&fx.db, &track).await.unwrap();
    track
}

#[tokio::test]
async fn publish_requires_valid_config_before_anything() {
    let fx = fixture().await;
    let engine = PublishEngine::new(fx.db.clone(), fx.store.clone());

    let result = engine
        .publish(uuid::Uuid::new_v4(), &FtpConfig::default())
        .await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn publish_unknown_track_is_not_found() {
    let fx = fixture().await;
    let engine = PublishEngine::new(fx.db.clone(), fx.store.clone());

    let result = engine.publish(uuid::Uuid::new_v4(), &ftp()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn publish_without_processed_artifact_fails_before_connecting() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Trimmed).await;

    let engine = PublishEngine::new(fx.db.clone(), fx.store.clone());
    // ftp.invalid is unreachable; reaching the network would surface a
    // connect error, not ArtifactMissing.
    let result = engine.publish(track.id, &ftp()).await;
    assert!(matches!(result, Err(Error::ArtifactMissing(_))));

    // Status must be untouched.
    let loaded = tracks::require_track(&fx.db, track.id).await.unwrap();
    assert_eq!(loaded.status, TrackStatus::Trimmed);
}

#[tokio::test]
async fn publish_with_dangling_processed_path_fails_before_connecting() {
    let fx = fixture().await;
    let mut track = insert_track(&fx, TrackStatus::Trimmed).await;
    track.processed_path = Some("processed/gone.mp3".to_string());
    tracks::save_track(&fx.db, &track).await.unwrap();

    let engine = PublishEngine::new(fx.db.clone(), fx.store.clone());
    let result = engine.publish(track.id, &ftp()).await;
    assert!(matches!(result, Err(Error::ArtifactMissing(_))));
}

#[tokio::test]
async fn publish_refuses_rejected_tracks() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Rejected).await;

    let engine = PublishEngine::new(fx.db.clone(), fx.store.clone());
    let result = engine.publish(track.id, &ftp()).await;
    assert!(matches!(result, Err(Error::PublishFailed(_))));
}

#[tokio::test]
async fn stale_clear_spares_acquired_artifacts() {
    let fx = fixture().await;

    // First acquisition: the downloader drops a title-derived file into
    // the incoming scratch bucket and the engine adopts it under its id.
    fx.store
        .put(Bucket::Incoming, "Some Song Title.mp3", b"audio-1")
        .unwrap();
    let produced = fx.store.newest_file(Bucket::Incoming, "mp3").unwrap().unwrap();
    let id1_blob = format!("{}.mp3", uuid::Uuid::new_v4());
    fx.store.adopt(&produced, Bucket::Downloads, &id1_blob).unwrap();

    // Second acquisition starts by clearing the scratch bucket.
    fx.store.clear_stale(Bucket::Incoming, "mp3").unwrap();

    assert!(
        fx.store.exists(Bucket::Downloads, &id1_blob),
        "an adopted artifact must survive later acquisitions"
    );
    assert!(fx
        .store
        .newest_file(Bucket::Incoming, "mp3")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn transform_refuses_rejected_tracks() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Rejected).await;

    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());
    let result = engine.transform(track.id, trim(), None).await;
    assert!(matches!(result, Err(Error::TransformFailed(_))));
}

#[tokio::test]
async fn transform_refuses_uploaded_tracks() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Uploaded).await;

    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());
    let result = engine.transform(track.id, trim(), None).await;
    assert!(matches!(result, Err(Error::TransformFailed(_))));

    // Terminal status must be untouched.
    let loaded = tracks::require_track(&fx.db, track.id).await.unwrap();
    assert_eq!(loaded.status, TrackStatus::Uploaded);
}

#[tokio::test]
async fn publish_refuses_uploaded_tracks() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Uploaded).await;

    let engine = PublishEngine::new(fx.db.clone(), fx.store.clone());
    let result = engine.publish(track.id, &ftp()).await;
    assert!(matches!(result, Err(Error::PublishFailed(_))));
}

#[tokio::test]
async fn transform_rejects_inverted_trim_window() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Downloaded).await;

    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());
    let settings = TrimSettings {
        start_time: 40.0,
        end_time: Some(10.0),
        max_duration: None,
        fade_in: 0.0,
        fade_out: 0.0,
    };
    let result = engine.transform(track.id, settings, None).await;
    match result {
        Err(Error::TransformFailed(msg)) => {
            assert!(msg.contains("not after start time"), "got {msg}")
        }
        other => panic!("expected TransformFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn transform_unknown_track_is_not_found() {
    let fx = fixture().await;
    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());

    let result = engine.transform(uuid::Uuid::new_v4(), trim(), None).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn transform_without_any_artifact_is_artifact_missing() {
    let fx = fixture().await;
    // No original_path and an empty downloads bucket: even the degraded
    // newest-file fallback has nothing to offer.
    let track = insert_track(&fx, TrackStatus::Downloaded).await;

    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());
    let result = engine.transform(track.id, trim(), None).await;
    assert!(matches!(result, Err(Error::ArtifactMissing(_))));
}

#[tokio::test]
async fn metadata_update_promotes_downloaded_to_processed() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Downloaded).await;

    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());
    let patch = tracklift_common::MetadataPatch {
        title: Some("New Title".to_string()),
        ..Default::default()
    };
    let updated = engine.update_metadata(track.id, &patch).await.unwrap();

    assert_eq!(updated.status, TrackStatus::Processed);
    assert_eq!(updated.metadata.title.as_deref(), Some("New Title"));
}

#[tokio::test]
async fn metadata_update_keeps_trimmed_status() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Trimmed).await;

    let engine = TransformEngine::new(fx.db.clone(), fx.store.clone(), Config::default());
    let updated = engine
        .update_metadata(track.id, &Default::default())
        .await
        .unwrap();
    assert_eq!(updated.status, TrackStatus::Trimmed);
}

#[tokio::test]
async fn reject_quarantines_artifacts() {
    let fx = fixture().await;
    let mut track = insert_track(&fx, TrackStatus::Downloaded).await;

    let blob_name = format!("{}.mp3", track.id);
    fx.store.put(Bucket::Downloads, &blob_name, b"audio").unwrap();
    track.original_path = Some(BlobStore::blob_ref(Bucket::Downloads, &blob_name));
    tracks::save_track(&fx.db, &track).await.unwrap();

    let rejected = engine::reject_track(&fx.db, &fx.store, track.id).await.unwrap();

    assert_eq!(rejected.status, TrackStatus::Rejected);
    assert!(!fx.store.exists(Bucket::Downloads, &blob_name));
    assert!(fx.store.exists(Bucket::Rejected, &blob_name));
    assert_eq!(
        rejected.original_path.as_deref(),
        Some(format!("rejected/{blob_name}").as_str())
    );
}

#[tokio::test]
async fn reject_refused_once_uploaded() {
    let fx = fixture().await;
    let track = insert_track(&fx, TrackStatus::Uploaded).await;

    let result = engine::reject_track(&fx.db, &fx.store, track.id).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn delete_removes_record_and_blobs() {
    let fx = fixture().await;
    let mut track = insert_track(&fx, TrackStatus::Downloaded).await;

    let blob_name = format!("{}.mp3", track.id);
    fx.store.put(Bucket::Downloads, &blob_name, b"audio").unwrap();
    track.original_path = Some(BlobStore::blob_ref(Bucket::Downloads, &blob_name));
    tracks::save_track(&fx.db, &track).await.unwrap();

    engine::delete_track(&fx.db, &fx.store, track.id).await.unwrap();

    assert!(tracks::load_track(&fx.db, track.id).await.unwrap().is_none());
    assert!(!fx.store.exists(Bucket::Downloads, &blob_name));
}

//! Publish stage
//!
//! Transfers a finished artifact to the configured FTP destination. The
//! config and the artifact are validated before any network activity, so
//! a misconfigured publish never opens a connection. The blocking FTP
//! client runs on the blocking pool; transport failures restore the
//! track's previous status.

use std::path::Path;

use sqlx::SqlitePool;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{NativeTlsConnector, NativeTlsFtpStream};
use tracing::{debug, info, warn};
use tracklift_common::db::tracks::{self, ProgressKind, Track};
use tracklift_common::{Error, FtpConfig, Result, TrackStatus};

use crate::storage::BlobStore;

/// Publishes finished artifacts over FTP
///
/// Operations on the same track id must be serialized by the caller.
pub struct PublishEngine {
    db: SqlitePool,
    store: BlobStore,
}

impl PublishEngine {
    pub fn new(db: SqlitePool, store: BlobStore) -> Self {
        Self { db, store }
    }

    /// Publish a track's processed artifact
    ///
    /// On success the track is `uploaded` (terminal). On any transport
    /// error the previous status is restored, `error` is populated, and
    /// `PublishFailed` carries the transport diagnostic.
    pub async fn publish(&self, id: uuid::Uuid, config: &FtpConfig) -> Result<Track> {
        config.validate()?;

        let mut track = tracks::require_track(&self.db, id).await?;
        if !track.status.can_transition_to(TrackStatus::Uploading) {
            return Err(Error::PublishFailed(format!(
                "track {id} cannot be published from status {}",
                track.status
            )));
        }

        // Artifact resolution happens before any connection is opened.
        let blob_ref = track.processed_path.clone().ok_or_else(|| {
            Error::ArtifactMissing(format!("track {id} has no processed artifact"))
        })?;
        let local = self.store.resolve(&blob_ref);
        if !local.is_file() {
            return Err(Error::ArtifactMissing(format!(
                "processed artifact {blob_ref} does not exist"
            )));
        }

        let previous_status = track.status;
        tracks::update_status(&self.db, id, TrackStatus::Uploading).await?;
        tracks::set_progress(&self.db, id, ProgressKind::Upload, Some(0.0)).await?;

        let remote_name = track.filename.clone();
        info!(track_id = %id, host = config.host, file = remote_name, "Publishing track");

        let upload_config = config.clone();
        let upload_result = tokio::task::spawn_blocking(move || {
            upload_blocking(&upload_config, &local, &remote_name)
        })
        .await
        .map_err(|e| Error::Internal(format!("upload task aborted: {e}")))?;

        if let Err(e) = upload_result {
            warn!(track_id = %id, "Publish failed: {e}");
            tracks::update_status(&self.db, id, previous_status).await?;
            tracks::set_error(&self.db, id, Some(&e.to_string())).await?;
            return Err(e);
        }

        track.status = TrackStatus::Uploaded;
        track.upload_progress = Some(100.0);
        track.error = None;
        tracks::save_track(&self.db, &track).await?;

        info!(track_id = %id, "Track published");
        Ok(track)
    }

    /// Publish an arbitrary local file as-is, staging it through the
    /// server-upload bucket (for files that arrive outside the pipeline)
    pub async fn publish_file(&self, source: &Path, config: &FtpConfig) -> Result<()> {
        config.validate()?;

        if !source.is_file() {
            return Err(Error::ArtifactMissing(format!(
                "{} does not exist",
                source.display()
            )));
        }
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::ArtifactMissing(format!("{} has no name", source.display())))?;

        let bytes = std::fs::read(source)?;
        let local = self
            .store
            .put(crate::storage::Bucket::ServerUpload, &name, &bytes)?;

        info!(host = config.host, file = name, "Publishing file");

        let upload_config = config.clone();
        tokio::task::spawn_blocking(move || upload_blocking(&upload_config, &local, &name))
            .await
            .map_err(|e| Error::Internal(format!("upload task aborted: {e}")))?
    }

    /// Validate destination connectivity without transferring anything
    pub async fn test_connection(config: &FtpConfig) -> Result<()> {
        config.validate()?;

        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = connect(&config)?;
            session
                .quit()
                .map_err(|e| Error::PublishFailed(format!("quit failed: {e}")))
        })
        .await
        .map_err(|e| Error::Internal(format!("connection test task aborted: {e}")))?
    }
}

/// Open a session: connect, optionally upgrade to TLS, and log in
fn connect(config: &FtpConfig) -> Result<NativeTlsFtpStream> {
    let addr = format!("{}:{}", config.host, config.port);
    let mut session = NativeTlsFtpStream::connect(&addr)
        .map_err(|e| Error::PublishFailed(format!("cannot connect to {addr}: {e}")))?;

    if config.secure {
        let connector = TlsConnector::new()
            .map_err(|e| Error::PublishFailed(format!("TLS setup failed: {e}")))?;
        session = session
            .into_secure(NativeTlsConnector::from(connector), &config.host)
            .map_err(|e| Error::PublishFailed(format!("TLS handshake failed: {e}")))?;
    }

    session
        .login(&config.user, &config.password)
        .map_err(|e| Error::PublishFailed(format!("login failed for {}: {e}", config.user)))?;

    Ok(session)
}

fn upload_blocking(config: &FtpConfig, local: &Path, remote_name: &str) -> Result<()> {
    let mut session = connect(config)?;

    session
        .transfer_type(FileType::Binary)
        .map_err(|e| Error::PublishFailed(format!("cannot set binary mode: {e}")))?;

    if let Some(remote_path) = &config.remote_path {
        ensure_remote_dir(&mut session, remote_path)?;
    }

    let mut file = std::fs::File::open(local)?;
    let bytes = session
        .put_file(remote_name, &mut file)
        .map_err(|e| Error::PublishFailed(format!("transfer of {remote_name} failed: {e}")))?;
    debug!("Uploaded {bytes} bytes to {remote_name}");

    session
        .quit()
        .map_err(|e| Error::PublishFailed(format!("quit failed: {e}")))?;

    Ok(())
}

/// Walk into `path` segment by segment, creating directories as needed
fn ensure_remote_dir(session: &mut NativeTlsFtpStream, path: &str) -> Result<()> {
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if session.cwd(segment).is_err() {
            session.mkdir(segment).map_err(|e| {
                Error::PublishFailed(format!("cannot create remote directory {segment}: {e}"))
            })?;
            session.cwd(segment).map_err(|e| {
                Error::PublishFailed(format!("cannot enter remote directory {segment}: {e}"))
            })?;
        }
    }
    Ok(())
}

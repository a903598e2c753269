//! Common error types for Tracklift
//!
//! One taxonomy shared by every pipeline stage. Stage failures carry the
//! external tool's diagnostic text; tool-not-found conditions are kept
//! distinct from tool-failed conditions so operators can tell "install the
//! tool" apart from "investigate this input".

use thiserror::Error;

/// Common result type for Tracklift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the track processing pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown track id
    #[error("Not found: {0}")]
    NotFound(String),

    /// URL is malformed or unsupported for the claimed source kind
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Downloader reported success but no artifact appeared in staging
    #[error("No artifact produced: {0}")]
    NoArtifactProduced(String),

    /// ffmpeg/ffprobe could not be located (or the downloader could not
    /// find them); remediation guidance included in the message
    #[error("Transcoder not available: {0}")]
    MissingTranscoder(String),

    /// Downloader process failed; raw diagnostic text attached
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// Transcoder invocation failed during trim/transcode
    #[error("Transform failed: {0}")]
    TransformFailed(String),

    /// The artifact referenced by the track record does not exist
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    /// FTP transfer or handshake failed
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

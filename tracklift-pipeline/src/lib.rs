//! Tracklift pipeline
//!
//! End-to-end media ingestion: acquire audio tracks from external
//! sources, trim and transcode them with ffmpeg, and publish finished
//! files to an FTP destination, tracking each track's lifecycle through
//! the persisted status state machine in `tracklift-common`.
//!
//! The caller is responsible for serializing operations on the same
//! track id; operations on different ids may run fully in parallel.

pub mod engine;
pub mod sources;
pub mod storage;
pub mod tempo;
pub mod tools;

pub use engine::{AcquisitionEngine, PublishEngine, TransformEngine, TrimPlan};
pub use storage::{BlobStore, Bucket};

//! Shared types, configuration and persistence for the Tracklift pipeline
//!
//! Holds everything the pipeline crates agree on: the track record and its
//! status state machine, the error taxonomy, the TOML configuration, and
//! the SQLite track record store.

pub mod config;
pub mod db;
pub mod error;
pub mod types;

pub use config::{AudioConfig, Config, FoldersConfig, FtpConfig, ProcessingConfig};
pub use error::{Error, Result};
pub use types::{Genre, MetadataPatch, SourceKind, TrackMetadata, TrackStatus, TrimSettings};

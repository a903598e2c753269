//! Shared pipeline types
//!
//! The track lifecycle is a closed state machine: every stage checks
//! [`TrackStatus::can_transition_to`] before promoting a record, so an
//! invalid string state cannot exist past the store boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Lifecycle status of a track record
///
/// `downloading → downloaded → processing → {processed | trimmed} →
/// uploading → uploaded`; `rejected` is reachable from any pre-upload
/// state, `error` from anywhere. `uploaded` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Downloading,
    Downloaded,
    Processing,
    Processed,
    Trimmed,
    Uploading,
    Uploaded,
    Rejected,
    Error,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Downloading => "downloading",
            TrackStatus::Downloaded => "downloaded",
            TrackStatus::Processing => "processing",
            TrackStatus::Processed => "processed",
            TrackStatus::Trimmed => "trimmed",
            TrackStatus::Uploading => "uploading",
            TrackStatus::Uploaded => "uploaded",
            TrackStatus::Rejected => "rejected",
            TrackStatus::Error => "error",
        }
    }

    /// Terminal states accept no further automatic transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Uploaded | TrackStatus::Rejected)
    }

    /// Whether a stage may advance a track from `self` to `next`
    ///
    /// `Error` is reachable from any state; re-entering the originating
    /// stage after an operator retry is modeled as the stage's normal
    /// entry transition from `Error`.
    pub fn can_transition_to(&self, next: TrackStatus) -> bool {
        use TrackStatus::*;

        // Rejection is allowed from any pre-upload state.
        if next == Rejected {
            return !matches!(self, Uploading | Uploaded | Rejected);
        }
        if next == Error {
            return true;
        }

        match self {
            Downloading => matches!(next, Downloaded),
            Downloaded => matches!(next, Processing | Processed | Trimmed),
            Processing => matches!(next, Processed | Trimmed),
            Processed => matches!(next, Processing | Trimmed | Uploading),
            Trimmed => matches!(next, Processing | Trimmed | Uploading),
            Uploading => matches!(next, Uploaded | Trimmed | Processed),
            Uploaded => false,
            Rejected => false,
            // Operator-triggered retry re-enters the originating stage.
            Error => matches!(next, Downloading | Processing | Uploading),
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "downloading" => Ok(TrackStatus::Downloading),
            "downloaded" => Ok(TrackStatus::Downloaded),
            "processing" => Ok(TrackStatus::Processing),
            "processed" => Ok(TrackStatus::Processed),
            "trimmed" => Ok(TrackStatus::Trimmed),
            "uploading" => Ok(TrackStatus::Uploading),
            "uploaded" => Ok(TrackStatus::Uploaded),
            "rejected" => Ok(TrackStatus::Rejected),
            "error" => Ok(TrackStatus::Error),
            other => Err(Error::Internal(format!("unknown track status: {other}"))),
        }
    }
}

/// Broad tempo category used for programming playlists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Fast,
    Medium,
    Slow,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fast => "fast",
            Genre::Medium => "medium",
            Genre::Slow => "slow",
        }
    }
}

impl FromStr for Genre {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fast" => Ok(Genre::Fast),
            "medium" => Ok(Genre::Medium),
            "slow" => Ok(Genre::Slow),
            other => Err(Error::Internal(format!("unknown genre: {other}"))),
        }
    }
}

/// Where a track was acquired from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// youtube.com / youtu.be (also the permissive default)
    YouTube,
    /// music.youtube.com
    YouTubeMusic,
    /// music.yandex.<tld>
    YandexMusic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::YouTube => "youtube",
            SourceKind::YouTubeMusic => "youtube_music",
            SourceKind::YandexMusic => "yandex_music",
        }
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "youtube" => Ok(SourceKind::YouTube),
            "youtube_music" => Ok(SourceKind::YouTubeMusic),
            "yandex_music" => Ok(SourceKind::YandexMusic),
            other => Err(Error::Internal(format!("unknown source kind: {other}"))),
        }
    }
}

/// Trim request parameters, seconds
///
/// Applied settings are copied into `TrackMetadata::trim_settings` after a
/// successful transform; the request itself is never persisted alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimSettings {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub max_duration: Option<f64>,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
}

impl TrimSettings {
    /// Reject requests that cannot describe a playable window
    pub fn validate(&self) -> Result<()> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(Error::TransformFailed(format!(
                "start time must be non-negative, got {}",
                self.start_time
            )));
        }
        if let Some(end) = self.end_time {
            if !end.is_finite() || end <= self.start_time {
                return Err(Error::TransformFailed(format!(
                    "end time {} is not after start time {}",
                    end, self.start_time
                )));
            }
        }
        if let Some(max) = self.max_duration {
            if !max.is_finite() || max <= 0.0 {
                return Err(Error::TransformFailed(format!(
                    "max duration must be positive, got {max}"
                )));
            }
        }
        if self.fade_in < 0.0 || self.fade_out < 0.0 {
            return Err(Error::TransformFailed(format!(
                "fade lengths must be non-negative, got in={} out={}",
                self.fade_in, self.fade_out
            )));
        }
        Ok(())
    }
}

/// Descriptive metadata carried on a track record
///
/// Fields are never cleared once populated except by explicit overwrite
/// (see [`MetadataPatch`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<Genre>,
    pub rating: Option<i64>,
    pub year: Option<i64>,
    /// Duration in seconds, probed best-effort
    pub duration: Option<f64>,
    /// Beats per minute, detected best-effort
    pub bpm: Option<f64>,
    #[serde(default)]
    pub is_trimmed: bool,
    pub trim_settings: Option<TrimSettings>,
    pub source_url: Option<String>,
    pub source_type: Option<SourceKind>,
}

/// Partial metadata overlay; `None` fields leave existing values intact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<Genre>,
    pub rating: Option<i64>,
    pub year: Option<i64>,
}

impl TrackMetadata {
    /// Apply a patch, overwriting only the fields the patch sets
    pub fn apply(&mut self, patch: &MetadataPatch) {
        if let Some(title) = &patch.title {
            self.title = Some(title.clone());
        }
        if let Some(artist) = &patch.artist {
            self.artist = Some(artist.clone());
        }
        if let Some(album) = &patch.album {
            self.album = Some(album.clone());
        }
        if let Some(genre) = patch.genre {
            self.genre = Some(genre);
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating);
        }
        if let Some(year) = patch.year {
            self.year = Some(year);
        }
    }
}

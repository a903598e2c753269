//! Configuration loading
//!
//! Read-only TOML configuration covering the publish destination, staging
//! folders, processing defaults and audio encoding parameters. Resolution
//! priority: explicit path → `TRACKLIFT_CONFIG` environment variable →
//! platform config directory → compiled defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Error, Result};

/// Publish destination for the FTP publish stage
///
/// Not owned by any track; supplied per publish call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Opt-in FTPS (explicit TLS)
    #[serde(default)]
    pub secure: bool,
    pub remote_path: Option<String>,
}

fn default_ftp_port() -> u16 {
    21
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_ftp_port(),
            user: String::new(),
            password: String::new(),
            secure: false,
            remote_path: None,
        }
    }
}

impl FtpConfig {
    /// Reject configs that cannot possibly connect
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("FTP host is not configured".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Config("FTP user is not configured".to_string()));
        }
        Ok(())
    }
}

/// Staging folder layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldersConfig {
    /// Root of the blob staging area; buckets live underneath it
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,
    /// Optional directory containing ffmpeg/ffprobe binaries
    pub ffmpeg_dir: Option<PathBuf>,
}

fn default_staging_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tracklift")
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            ffmpeg_dir: None,
        }
    }
}

/// Processing defaults applied to new and transformed tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Default output duration ceiling in seconds when a trim request
    /// carries neither an end time nor a max duration
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,
    #[serde(default = "default_rating")]
    pub default_rating: i64,
    #[serde(default = "default_year")]
    pub default_year: i64,
}

fn default_max_duration() -> f64 {
    360.0
}

fn default_rating() -> i64 {
    5
}

fn default_year() -> i64 {
    2024
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_duration: default_max_duration(),
            default_rating: default_rating(),
            default_year: default_year(),
        }
    }
}

/// Audio encoding parameters passed to the transcoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u32 {
    2
}

fn default_bitrate() -> String {
    "192k".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bitrate: default_bitrate(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ftp: FtpConfig,
    #[serde(default)]
    pub folders: FoldersConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

impl Config {
    /// Load configuration with resolution priority:
    /// 1. Explicit path argument
    /// 2. `TRACKLIFT_CONFIG` environment variable
    /// 3. `<config dir>/tracklift/config.toml`
    /// 4. Compiled defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit_path {
            info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("TRACKLIFT_CONFIG") {
            info!("Loading config from TRACKLIFT_CONFIG={}", path);
            return Self::from_file(Path::new(&path));
        }

        if let Some(dir) = dirs::config_dir() {
            let path = dir.join("tracklift").join("config.toml");
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Self::from_file(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.processing.max_duration, 360.0);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.bitrate, "192k");
        assert_eq!(config.ftp.port, 21);
        assert!(!config.ftp.secure);
    }

    #[test]
    fn ftp_validation_requires_host_and_user() {
        let mut ftp = FtpConfig::default();
        assert!(ftp.validate().is_err());

        ftp.host = "ftp.example.com".to_string();
        assert!(ftp.validate().is_err());

        ftp.user = "radio".to_string();
        assert!(ftp.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ftp]
            host = "ftp.example.com"
            user = "radio"
            secure = true

            [processing]
            max_duration = 240.0
            "#,
        )
        .unwrap();

        assert_eq!(config.ftp.host, "ftp.example.com");
        assert!(config.ftp.secure);
        assert_eq!(config.ftp.port, 21);
        assert_eq!(config.processing.max_duration, 240.0);
        assert_eq!(config.processing.default_rating, 5);
        assert_eq!(config.audio.sample_rate, 44_100);
    }
}

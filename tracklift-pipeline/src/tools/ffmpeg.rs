//! ffmpeg location and invocation
//!
//! The transcoder is external; this module resolves which installation to
//! use and wraps the subprocess calls the pipeline needs: trim/transcode,
//! raw PCM decode for tempo analysis, and duration probing.
//!
//! Location is an ordered list of strategies, first match wins. A
//! candidate directory is only accepted when both the encoder and the
//! prober exist there, so a half-installed toolchain is never picked.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use tracklift_common::{Config, Error, Result};

/// Environment markers for serverless hosts where spawning processes is
/// unavailable; probing the filesystem there is pointless.
const RESTRICTED_ENV_MARKERS: &[&str] = &["AWS_LAMBDA_FUNCTION_NAME", "LAMBDA_TASK_ROOT", "VERCEL"];

/// Directory override checked before configuration and PATH
pub const FFMPEG_DIR_ENV: &str = "TRACKLIFT_FFMPEG_DIR";

/// A validated ffmpeg installation
#[derive(Debug, Clone)]
pub struct FfmpegLocation {
    /// Directory containing both executables
    pub dir: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

fn exe_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// Validate a candidate directory: both ffmpeg and ffprobe must exist
fn validate_dir(dir: &Path) -> Option<FfmpegLocation> {
    let ffmpeg = dir.join(exe_name("ffmpeg"));
    let ffprobe = dir.join(exe_name("ffprobe"));
    if ffmpeg.is_file() && ffprobe.is_file() {
        Some(FfmpegLocation {
            dir: dir.to_path_buf(),
            ffmpeg,
            ffprobe,
        })
    } else {
        None
    }
}

fn common_install_dirs() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            PathBuf::from(r"C:\ffmpeg\bin"),
            PathBuf::from(r"C:\Program Files\ffmpeg\bin"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/snap/bin"),
        ]
    }
}

/// Locate an ffmpeg installation
///
/// Search order, first validated match wins:
/// 1. Skip entirely in restricted (serverless) environments
/// 2. Project-local `bin/` directory
/// 3. `TRACKLIFT_FFMPEG_DIR` environment override
/// 4. Configured `folders.ffmpeg_dir`
/// 5. Every entry on `PATH`
/// 6. Common per-OS installation directories
///
/// `None` means "feature unavailable" to the detector and the acquisition
/// engine; only the transform engine treats it as fatal.
pub fn locate(config: &Config) -> Option<FfmpegLocation> {
    if RESTRICTED_ENV_MARKERS
        .iter()
        .any(|var| std::env::var_os(var).is_some())
    {
        debug!("Restricted execution environment detected, skipping ffmpeg lookup");
        return None;
    }

    let mut candidates: Vec<PathBuf> = vec![PathBuf::from("bin")];

    if let Some(dir) = std::env::var_os(FFMPEG_DIR_ENV) {
        candidates.push(PathBuf::from(dir));
    }
    if let Some(dir) = &config.folders.ffmpeg_dir {
        candidates.push(dir.clone());
    }
    if let Some(path_var) = std::env::var_os("PATH") {
        candidates.extend(std::env::split_paths(&path_var));
    }
    candidates.extend(common_install_dirs());

    for candidate in candidates {
        if let Some(location) = validate_dir(&candidate) {
            debug!("Using ffmpeg from {}", location.dir.display());
            return Some(location);
        }
    }

    warn!("No ffmpeg installation found");
    None
}

/// One trim/transcode invocation
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Start offset in seconds
    pub start: Option<f64>,
    /// Output duration in seconds
    pub duration: Option<f64>,
    /// afade filter chain, already formatted
    pub filters: Option<String>,
    pub sample_rate: u32,
    pub channels: u32,
    pub bitrate: String,
}

/// Run one transcode; non-zero exit surfaces the tool's diagnostic text
pub async fn run_transcode(location: &FfmpegLocation, job: &TranscodeJob) -> Result<()> {
    let mut cmd = Command::new(&location.ffmpeg);
    cmd.arg("-y").arg("-i").arg(&job.input);

    if let Some(start) = job.start {
        cmd.arg("-ss").arg(format!("{start}"));
    }
    if let Some(duration) = job.duration {
        cmd.arg("-t").arg(format!("{duration}"));
    }
    if let Some(filters) = &job.filters {
        cmd.arg("-af").arg(filters);
    }

    cmd.arg("-ar")
        .arg(job.sample_rate.to_string())
        .arg("-ac")
        .arg(job.channels.to_string())
        .arg("-b:a")
        .arg(&job.bitrate)
        .arg(&job.output)
        .stdin(Stdio::null());

    debug!(
        input = %job.input.display(),
        output = %job.output.display(),
        "Invoking ffmpeg"
    );

    let output = cmd.output().await.map_err(|e| {
        Error::TransformFailed(format!("failed to spawn {}: {e}", location.ffmpeg.display()))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::TransformFailed(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Decode a file to mono f32 samples at `sample_rate` over a pipe
///
/// Used by the native-binary tempo tier; output format matches what the
/// in-process decode tier produces so both feed the same estimator.
pub async fn decode_to_mono_pcm(
    location: &FfmpegLocation,
    input: &Path,
    sample_rate: u32,
) -> Result<Vec<f32>> {
    let output = Command::new(&location.ffmpeg)
        .arg("-i")
        .arg(input)
        .args(["-f", "s16le", "-ac", "1", "-ar"])
        .arg(sample_rate.to_string())
        .arg("-")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Internal(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Internal(format!(
            "ffmpeg decode exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let samples = output
        .stdout
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect();

    Ok(samples)
}

/// Probe the duration of a media file in seconds (best-effort enrichment)
pub async fn probe_duration(location: &FfmpegLocation, input: &Path) -> Result<f64> {
    let output = Command::new(&location.ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Internal(format!("failed to spawn ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Internal(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse::<f64>()
        .map_err(|e| Error::Internal(format!("unparseable ffprobe duration {text:?}: {e}")))
}

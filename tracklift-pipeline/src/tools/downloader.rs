//! yt-dlp invocation
//!
//! One argument profile per source kind. The downloader extracts audio
//! and converts to mp3 itself, which requires ffmpeg; when the locator
//! resolved an installation its directory is passed along so the embedded
//! conversion step can find it.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use tracklift_common::{Error, Result, SourceKind};

const YT_DLP: &str = "yt-dlp";

/// Per-source argument profile
fn profile_args(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        // Plain video URLs may point into playlists; only take the item.
        SourceKind::YouTube => &["--no-playlist", "-x", "--audio-format", "mp3"],
        // Music service streams carry a dedicated audio rendition; ask for
        // the best one.
        SourceKind::YouTubeMusic => &[
            "--no-playlist",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "0",
        ],
        // Track URLs are single items already.
        SourceKind::YandexMusic => &["-x", "--audio-format", "mp3"],
    }
}

/// Run the downloader for `url`, writing into `output_dir`
///
/// Exit code 0 means the tool *reported* success; the caller still has to
/// verify an artifact actually appeared (silent tool failures happen).
pub async fn download(
    url: &str,
    kind: SourceKind,
    output_dir: &Path,
    ffmpeg_dir: Option<&Path>,
) -> Result<()> {
    let template = output_dir.join("%(title)s.%(ext)s");

    let mut cmd = Command::new(YT_DLP);
    cmd.args(profile_args(kind))
        .arg("-o")
        .arg(&template)
        .arg(url)
        .stdin(Stdio::null());

    if let Some(dir) = ffmpeg_dir {
        cmd.arg("--ffmpeg-location").arg(dir);
    }

    debug!(url = url, kind = kind.as_str(), "Invoking yt-dlp");

    let output = cmd.output().await.map_err(|e| {
        Error::AcquisitionFailed(format!("failed to spawn {YT_DLP}: {e} (is yt-dlp installed?)"))
    })?;

    if !output.status.success() {
        let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if diagnostic.is_empty() {
            diagnostic = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        return Err(classify_failure(&diagnostic));
    }

    Ok(())
}

/// Distinguish "install the tool" from "investigate this input"
///
/// yt-dlp reports a missing ffmpeg in its postprocessor diagnostics; that
/// case gets remediation guidance instead of the raw dump.
pub fn classify_failure(diagnostic: &str) -> Error {
    let lower = diagnostic.to_lowercase();
    if lower.contains("ffmpeg") || lower.contains("ffprobe") {
        Error::MissingTranscoder(format!(
            "yt-dlp could not find ffmpeg for audio conversion. Install ffmpeg or set \
             {} to its directory. Tool output: {}",
            crate::tools::ffmpeg::FFMPEG_DIR_ENV,
            diagnostic
        ))
    } else {
        Error::AcquisitionFailed(format!("yt-dlp failed: {diagnostic}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ffmpeg_is_classified_distinctly() {
        let err = classify_failure("ERROR: Postprocessing: ffprobe and ffmpeg not found");
        assert!(matches!(err, Error::MissingTranscoder(_)));
        assert!(err.to_string().contains("Install ffmpeg"));
    }

    #[test]
    fn other_failures_keep_raw_diagnostic() {
        let err = classify_failure("ERROR: [youtube] abc: Video unavailable");
        match err {
            Error::AcquisitionFailed(msg) => assert!(msg.contains("Video unavailable")),
            other => panic!("expected AcquisitionFailed, got {other:?}"),
        }
    }

    #[test]
    fn music_profile_requests_best_quality() {
        assert!(profile_args(SourceKind::YouTubeMusic).contains(&"--audio-quality"));
        assert!(!profile_args(SourceKind::YandexMusic).contains(&"--no-playlist"));
    }
}

//! Tempo detection
//!
//! Two-tier strategy, first success wins:
//! 1. In-process decode (symphonia + rubato) feeding the estimator
//! 2. Native ffmpeg decode over a pipe feeding the same estimator
//!
//! Tempo is best-effort enrichment: each tier logs a warning on failure
//! and the operation as a whole never errors.

pub mod decode;
pub mod estimator;

use std::path::Path;
use tracing::warn;

use crate::tools::ffmpeg::{self, FfmpegLocation};

/// Fixed sample rate both tiers normalize to before estimation
pub const ANALYSIS_SAMPLE_RATE: u32 = 44_100;

/// Detect the tempo of an audio file in beats per minute
///
/// Returns a positive BPM or `None`; never an error, even for corrupt
/// input or a panicking decoder.
pub async fn detect_tempo(path: &Path, location: Option<&FfmpegLocation>) -> Option<f64> {
    // Tier 1: portable in-process decode.
    let tier1_path = path.to_path_buf();
    let decoded =
        tokio::task::spawn_blocking(move || decode::decode_file(&tier1_path, ANALYSIS_SAMPLE_RATE))
            .await;
    match decoded {
        Ok(Ok(samples)) => {
            if let Some(bpm) = estimator::estimate_bpm(&samples, ANALYSIS_SAMPLE_RATE) {
                return Some(bpm);
            }
            warn!(path = %path.display(), "Tempo estimator did not converge on decoded samples");
        }
        Ok(Err(e)) => {
            warn!(path = %path.display(), "In-process decode failed for tempo detection: {e}");
        }
        Err(e) => {
            warn!(path = %path.display(), "In-process decode task aborted: {e}");
        }
    }

    // Tier 2: native binary decode, when an installation was located.
    let Some(location) = location else {
        return None;
    };
    match ffmpeg::decode_to_mono_pcm(location, path, ANALYSIS_SAMPLE_RATE).await {
        Ok(samples) => {
            let bpm = estimator::estimate_bpm(&samples, ANALYSIS_SAMPLE_RATE);
            if bpm.is_none() {
                warn!(path = %path.display(), "Tempo estimator did not converge on ffmpeg output");
            }
            bpm
        }
        Err(e) => {
            warn!(path = %path.display(), "ffmpeg decode failed for tempo detection: {e}");
            None
        }
    }
}

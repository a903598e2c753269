//! End-to-end tempo detection against generated WAV fixtures
//!
//! Exercises the in-process decode tier on real files; the ffmpeg tier
//! is not assumed to be installed and is left disabled (`None`).

use std::path::PathBuf;

use tempfile::TempDir;
use tracklift_pipeline::tempo;

const SAMPLE_RATE: u32 = 44_100;

/// Write a mono 16-bit click track: short bursts at a fixed beat period
/// over low-level noise.
fn write_click_track(dir: &TempDir, name: &str, bpm: f64, seconds: f64) -> PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();

    let total = (seconds * SAMPLE_RATE as f64) as usize;
    let period = (60.0 / bpm * SAMPLE_RATE as f64) as usize;
    let click_len = SAMPLE_RATE as usize / 100;
    for i in 0..total {
        let in_click = i % period < click_len;
        let sample: i16 = if in_click {
            if i % 2 == 0 {
                20_000
            } else {
                -20_000
            }
        } else {
            ((i * 7919) % 41) as i16 - 20
        };
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[tokio::test]
async fn detects_click_track_at_120_bpm() {
    let dir = TempDir::new().unwrap();
    let path = write_click_track(&dir, "click120.wav", 120.0, 20.0);

    let bpm = tempo::detect_tempo(&path, None).await.unwrap();
    assert!((bpm - 120.0).abs() < 5.0, "got {bpm}");
}

#[tokio::test]
async fn detects_click_track_at_90_bpm() {
    let dir = TempDir::new().unwrap();
    let path = write_click_track(&dir, "click90.wav", 90.0, 20.0);

    let bpm = tempo::detect_tempo(&path, None).await.unwrap();
    assert!((bpm - 90.0).abs() < 5.0, "got {bpm}");
}

#[tokio::test]
async fn silence_yields_no_tempo() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("silence.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..SAMPLE_RATE * 10 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    assert!(tempo::detect_tempo(&path, None).await.is_none());
}

#[tokio::test]
async fn corrupt_file_yields_no_tempo() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.mp3");
    std::fs::write(&path, [0x42u8; 4096]).unwrap();

    assert!(tempo::detect_tempo(&path, None).await.is_none());
}

#[tokio::test]
async fn missing_file_yields_no_tempo() {
    let path = PathBuf::from("/nonexistent/track.wav");
    assert!(tempo::detect_tempo(&path, None).await.is_none());
}

#[tokio::test]
async fn stereo_input_is_mixed_down_before_estimation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stereo.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();

    let bpm = 120.0;
    let total = SAMPLE_RATE as usize * 20;
    let period = (60.0 / bpm * SAMPLE_RATE as f64) as usize;
    let click_len = SAMPLE_RATE as usize / 100;
    for i in 0..total {
        let sample: i16 = if i % period < click_len { 18_000 } else { 0 };
        // Click on the left channel only; mixdown should still carry it.
        writer.write_sample(sample).unwrap();
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let detected = tempo::detect_tempo(&path, None).await.unwrap();
    assert!((detected - bpm).abs() < 5.0, "got {detected}");
}

//! In-process audio decoding for tempo analysis
//!
//! symphonia decodes whatever container/codec the staging area holds into
//! mono f32 samples in [-1, 1]; rubato brings them to the fixed analysis
//! rate so the estimator always sees the same timebase.

use rubato::{FftFixedIn, Resampler};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracklift_common::{Error, Result};

const RESAMPLE_CHUNK: usize = 1024;

/// Decode a file to mono f32 samples at `target_rate`
pub fn decode_file(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Internal(format!("probe failed for {}: {e}", path.display())))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Internal(format!("no audio track in {}", path.display())))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Internal("sample rate unknown".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Internal(format!("decoder creation failed: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(Error::Internal(format!("packet read failed: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::Internal(format!("decode failed: {e}")))?;
        mixdown_ref(&decoded, &mut samples);
    }

    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate = sample_rate,
        "Decoded for tempo analysis"
    );

    if sample_rate == target_rate {
        Ok(samples)
    } else {
        resample(&samples, sample_rate, target_rate)
    }
}

/// Mix a decoded buffer of any sample format down to mono f32
fn mixdown_ref(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::U16(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::U24(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::U32(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::S8(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::S16(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::S24(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::S32(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::F32(buf) => mixdown(buf.as_ref(), out),
        AudioBufferRef::F64(buf) => mixdown(buf.as_ref(), out),
    }
}

fn mixdown<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    out.reserve(frames);
    for frame in 0..frames {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            sum += f32::from_sample(buf.chan(ch)[frame]);
        }
        out.push(sum / channels as f32);
    }
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| Error::Internal(format!("resampler creation failed: {e}")))?;

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64) as usize;
    let mut out = Vec::with_capacity(expected);

    for chunk in samples.chunks(RESAMPLE_CHUNK) {
        let mut frame = chunk.to_vec();
        frame.resize(RESAMPLE_CHUNK, 0.0);
        let resampled = resampler
            .process(&[frame], None)
            .map_err(|e| Error::Internal(format!("resample failed: {e}")))?;
        out.extend_from_slice(&resampled[0]);
    }

    Ok(out)
}

//! Beats-per-minute estimation
//!
//! Onset detection by short-time energy flux, then an inter-onset-interval
//! histogram with half/double tempo folding; the strongest peak in the
//! valid BPM range wins. Returns `None` instead of guessing when the
//! signal carries too few onsets or no interval stands out.

const FRAME_SIZE: usize = 1024;
const HOP_SIZE: usize = 512;

/// Valid tempo range; intervals outside it are folded or discarded
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;

/// Histogram resolution in milliseconds per bin
const BIN_WIDTH_MS: f64 = 2.0;

/// Below this many onsets the estimate would be noise
const MIN_ONSETS: usize = 8;

/// Minimum accumulated histogram weight for a peak to count
const MIN_PEAK_WEIGHT: f32 = 2.0;

/// Estimate the tempo of a mono sample stream
///
/// Input samples are expected in [-1, 1]; non-finite values are tolerated
/// and treated as silence. The result is a positive BPM in
/// [`MIN_BPM`, `MAX_BPM`] or `None`.
pub fn estimate_bpm(samples: &[f32], sample_rate: u32) -> Option<f64> {
    if sample_rate == 0 || samples.len() < FRAME_SIZE * 4 {
        return None;
    }

    let onsets_ms = detect_onsets(samples, sample_rate);
    if onsets_ms.len() < MIN_ONSETS {
        return None;
    }

    let histogram = build_interval_histogram(&onsets_ms);
    let smoothed = smooth(&histogram, 3);

    let (best_bin, best_weight) = smoothed
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    if best_weight < MIN_PEAK_WEIGHT {
        return None;
    }

    let min_interval_ms = 60_000.0 / MAX_BPM;
    let interval_ms = min_interval_ms + (best_bin as f64 + 0.5) * BIN_WIDTH_MS;
    let bpm = 60_000.0 / interval_ms;

    Some(bpm.clamp(MIN_BPM, MAX_BPM))
}

/// Onset times in milliseconds, via energy flux with an adaptive threshold
fn detect_onsets(samples: &[f32], sample_rate: u32) -> Vec<f64> {
    // Mean-square energy per frame; corrupt (non-finite) samples count as
    // silence so a damaged file degrades instead of poisoning the flux.
    let mut energies = Vec::with_capacity(samples.len() / HOP_SIZE);
    let mut start = 0;
    while start + FRAME_SIZE <= samples.len() {
        let frame = &samples[start..start + FRAME_SIZE];
        let energy: f32 = frame
            .iter()
            .map(|s| if s.is_finite() { s * s } else { 0.0 })
            .sum::<f32>()
            / FRAME_SIZE as f32;
        energies.push(energy);
        start += HOP_SIZE;
    }
    if energies.len() < 3 {
        return Vec::new();
    }

    // Positive energy flux only: rises mark onsets, decays do not.
    let flux: Vec<f32> = energies
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(0.0))
        .collect();

    let mean = flux.iter().sum::<f32>() / flux.len() as f32;
    let variance = flux.iter().map(|f| (f - mean).powi(2)).sum::<f32>() / flux.len() as f32;
    let threshold = mean + 1.5 * variance.sqrt();
    if !threshold.is_finite() || threshold <= 0.0 {
        return Vec::new();
    }

    let frame_ms = HOP_SIZE as f64 * 1000.0 / sample_rate as f64;
    let min_gap_frames = ((100.0 / frame_ms).ceil() as usize).max(1);

    let mut onsets = Vec::new();
    let mut last_onset_frame: Option<usize> = None;
    for i in 1..flux.len().saturating_sub(1) {
        let is_peak = flux[i] > threshold && flux[i] >= flux[i - 1] && flux[i] > flux[i + 1];
        if !is_peak {
            continue;
        }
        if let Some(last) = last_onset_frame {
            if i - last < min_gap_frames {
                continue;
            }
        }
        last_onset_frame = Some(i);
        onsets.push(i as f64 * frame_ms);
    }
    onsets
}

/// Histogram over inter-onset intervals inside the valid BPM range
///
/// Half and double intervals are folded in at reduced weight so a tempo
/// expressed mostly in off-beats still accumulates on the true beat.
fn build_interval_histogram(onsets_ms: &[f64]) -> Vec<f32> {
    let min_interval_ms = 60_000.0 / MAX_BPM;
    let max_interval_ms = 60_000.0 / MIN_BPM;
    let bins = ((max_interval_ms - min_interval_ms) / BIN_WIDTH_MS).ceil() as usize;
    let mut histogram = vec![0.0f32; bins];

    let mut accumulate = |interval_ms: f64, weight: f32| {
        if interval_ms >= min_interval_ms && interval_ms < max_interval_ms {
            let bin = ((interval_ms - min_interval_ms) / BIN_WIDTH_MS) as usize;
            histogram[bin.min(bins - 1)] += weight;
        }
    };

    for pair in onsets_ms.windows(2) {
        let interval = pair[1] - pair[0];
        if interval <= 0.0 || !interval.is_finite() {
            continue;
        }
        accumulate(interval, 1.0);
        accumulate(interval / 2.0, 0.5);
        accumulate(interval * 2.0, 0.5);
    }

    histogram
}

fn smooth(histogram: &[f32], window: usize) -> Vec<f32> {
    let half = window / 2;
    (0..histogram.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(histogram.len());
            histogram[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}

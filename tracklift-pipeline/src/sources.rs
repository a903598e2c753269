//! Source URL classification
//!
//! Pure functions over URL patterns. `classify` is total: any string that
//! does not match a known music service falls back to the plain video
//! platform kind, so the acquisition path always has a strategy to
//! attempt. `extract_id` is the opposite: callers must treat `None` as an
//! unsupported URL and fail fast rather than guessing.

use once_cell::sync::Lazy;
use regex::Regex;
use tracklift_common::SourceKind;

static YANDEX_ALBUM_TRACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"music\.yandex\.[a-z]+/album/\d+/track/(\d+)").expect("valid regex")
});

static YANDEX_TRACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"music\.yandex\.[a-z]+/track/(\d+)").expect("valid regex"));

/// Classify an input URL into a source kind
///
/// Unrecognized URLs default to [`SourceKind::YouTube`]; yt-dlp handles a
/// wide range of sites, so an unknown URL is still worth an attempt.
pub fn classify(url: &str) -> SourceKind {
    if url.contains("music.yandex.") {
        SourceKind::YandexMusic
    } else if url.contains("music.youtube.com") {
        SourceKind::YouTubeMusic
    } else {
        SourceKind::YouTube
    }
}

/// Extract the numeric track id from a Yandex Music URL
///
/// Matches both supported shapes:
/// - `music.yandex.<tld>/track/<id>`
/// - `music.yandex.<tld>/album/<album>/track/<id>`
pub fn extract_id(url: &str) -> Option<String> {
    YANDEX_ALBUM_TRACK_RE
        .captures(url)
        .or_else(|| YANDEX_TRACK_RE.captures(url))
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_with_video_fallback() {
        assert_eq!(
            classify("https://video.example/watch?v=abc"),
            SourceKind::YouTube
        );
        assert_eq!(classify(""), SourceKind::YouTube);
        assert_eq!(classify("not a url at all"), SourceKind::YouTube);
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            SourceKind::YouTube
        );
    }

    #[test]
    fn classify_recognizes_music_variants() {
        assert_eq!(
            classify("https://music.youtube.com/watch?v=abc123"),
            SourceKind::YouTubeMusic
        );
        assert_eq!(
            classify("https://music.yandex.ru/track/12345"),
            SourceKind::YandexMusic
        );
        assert_eq!(
            classify("https://music.yandex.com/album/99/track/7"),
            SourceKind::YandexMusic
        );
    }

    #[test]
    fn extract_id_direct_track_url() {
        assert_eq!(
            extract_id("https://music.yandex.ru/track/12345"),
            Some("12345".to_string())
        );
    }

    #[test]
    fn extract_id_album_track_url() {
        assert_eq!(
            extract_id("https://music.yandex.ru/album/67890/track/12345"),
            Some("12345".to_string())
        );
    }

    #[test]
    fn extract_id_rejects_urls_without_numeric_track_segment() {
        assert_eq!(extract_id("https://music.yandex.ru/artist/abc"), None);
        assert_eq!(extract_id("https://music.yandex.ru/track/abc"), None);
        assert_eq!(extract_id("https://video.example/watch?v=abc"), None);
        assert_eq!(extract_id(""), None);
    }
}

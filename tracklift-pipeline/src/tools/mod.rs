//! External CLI tool adapters
//!
//! Thin, swappable wrappers around the transcoder (ffmpeg) and the
//! downloader (yt-dlp). Everything here talks subprocess; exit code 0 is
//! success, anything else carries its diagnostic text back up.

pub mod downloader;
pub mod ffmpeg;

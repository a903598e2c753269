//! tracklift - track processing pipeline CLI
//!
//! Operator surface for the pipeline: acquire, transform, preview,
//! publish, reject and delete tracks. Contains no pipeline logic of its
//! own; everything is delegated to the engines.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tracklift_common::db::{init_database_pool, tracks};
use tracklift_common::{Config, Genre, MetadataPatch, TrimSettings};
use tracklift_pipeline::engine::{self, AcquisitionEngine, PublishEngine, TransformEngine};
use tracklift_pipeline::{storage::BlobStore, tempo, tools::ffmpeg};

#[derive(Parser)]
#[command(name = "tracklift", version, about = "Track processing pipeline")]
struct Cli {
    /// Path to config.toml (falls back to TRACKLIFT_CONFIG, then the
    /// platform config directory, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct TrimArgs {
    /// Start offset in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,
    /// End time in seconds
    #[arg(long)]
    end: Option<f64>,
    /// Output duration cap in seconds (used when no end time is given)
    #[arg(long)]
    max_duration: Option<f64>,
    /// Fade-in length in seconds
    #[arg(long, default_value_t = 0.0)]
    fade_in: f64,
    /// Fade-out length in seconds
    #[arg(long, default_value_t = 0.0)]
    fade_out: f64,
}

impl From<TrimArgs> for TrimSettings {
    fn from(args: TrimArgs) -> Self {
        TrimSettings {
            start_time: args.start,
            end_time: args.end,
            max_duration: args.max_duration,
            fade_in: args.fade_in,
            fade_out: args.fade_out,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Download a track from a source URL into the staging area
    Acquire { url: String },
    /// Trim/transcode a downloaded track
    Transform {
        id: Uuid,
        #[command(flatten)]
        trim: TrimArgs,
    },
    /// Produce a short-lived trim preview without touching the record
    Preview {
        id: Uuid,
        #[command(flatten)]
        trim: TrimArgs,
    },
    /// Update track metadata without transcoding
    SetMetadata {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        genre: Option<Genre>,
        #[arg(long)]
        rating: Option<i64>,
        #[arg(long)]
        year: Option<i64>,
    },
    /// Upload a track's processed artifact to the configured FTP server
    Publish { id: Uuid },
    /// Upload an arbitrary local file as-is
    PublishFile { path: PathBuf },
    /// Verify FTP connectivity without transferring anything
    TestFtp,
    /// Detect the tempo of an audio file
    Tempo { path: PathBuf },
    /// List all tracks
    List,
    /// Reject a track (artifacts kept in the rejected bucket)
    Reject { id: Uuid },
    /// Delete a track record and its artifacts
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let store = BlobStore::open(config.folders.staging_root.clone())?;
    let db_path = config.folders.staging_root.join("tracklift.db");
    let db = init_database_pool(&db_path).await?;
    info!("Staging area: {}", config.folders.staging_root.display());

    match cli.command {
        Command::Acquire { url } => {
            let engine = AcquisitionEngine::new(db, store, config);
            let track = engine.acquire(&url).await?;
            println!("{} {} [{}]", track.id, track.filename, track.status);
        }
        Command::Transform { id, trim } => {
            let engine = TransformEngine::new(db, store, config);
            let track = engine.transform(id, trim.into(), None).await?;
            println!(
                "{} -> {} [{}]",
                track.id,
                track.processed_path.as_deref().unwrap_or("-"),
                track.status
            );
        }
        Command::Preview { id, trim } => {
            let engine = TransformEngine::new(db, store, config);
            let path = engine.preview(id, trim.into()).await?;
            println!("{}", path.display());
        }
        Command::SetMetadata {
            id,
            title,
            artist,
            album,
            genre,
            rating,
            year,
        } => {
            let engine = TransformEngine::new(db, store, config);
            let patch = MetadataPatch {
                title,
                artist,
                album,
                genre,
                rating,
                year,
            };
            let track = engine.update_metadata(id, &patch).await?;
            println!("{} [{}]", track.id, track.status);
        }
        Command::Publish { id } => {
            let engine = PublishEngine::new(db, store);
            let track = engine.publish(id, &config.ftp).await?;
            println!("{} [{}]", track.id, track.status);
        }
        Command::PublishFile { path } => {
            let engine = PublishEngine::new(db, store);
            engine.publish_file(&path, &config.ftp).await?;
            println!("uploaded {}", path.display());
        }
        Command::TestFtp => {
            PublishEngine::test_connection(&config.ftp).await?;
            println!("connection to {} ok", config.ftp.host);
        }
        Command::Tempo { path } => {
            let location = ffmpeg::locate(&config);
            match tempo::detect_tempo(&path, location.as_ref()).await {
                Some(bpm) => println!("{bpm:.1} bpm"),
                None => println!("tempo could not be detected"),
            }
        }
        Command::List => {
            for track in tracks::list_tracks(&db).await? {
                println!(
                    "{}  {:<12} {:>6}  {}",
                    track.id,
                    track.status,
                    track
                        .metadata
                        .bpm
                        .map(|bpm| format!("{bpm:.0}bpm"))
                        .unwrap_or_else(|| "-".to_string()),
                    track.filename
                );
            }
        }
        Command::Reject { id } => {
            let track = engine::reject_track(&db, &store, id).await?;
            println!("{} [{}]", track.id, track.status);
        }
        Command::Delete { id } => {
            engine::delete_track(&db, &store, id).await?;
            println!("deleted {id}");
        }
    }

    Ok(())
}

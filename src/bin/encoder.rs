//! vidstream-encoder - Encodes additional HLS renditions for published videos
//! and merges them into each video's master playlist.

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vidstream::adapters::local::{FfmpegRunner, FsObjectStore};
use vidstream::application::{EncodeSettings, EncoderService};
use vidstream::domain::manifest::{LinePositionMerger, ManifestMerger, StructuralMerger};
use vidstream::domain::resolution::Resolution;
use vidstream::ports::storage::ObjectStore;
use vidstream::EncoderConfig;

#[derive(Parser)]
#[command(name = "vidstream-encoder")]
#[command(author, version, about = "Encode extra renditions for published videos")]
struct Cli {
    /// Ids of the videos to encode
    #[arg(required = true)]
    videos: Vec<String>,

    /// Derive the ladder from the source and encode with libx264
    #[arg(long)]
    cpu: bool,

    /// GPU targets, `WxH@bitrate` separated by commas
    #[arg(long, value_delimiter = ',')]
    targets: Vec<Resolution>,

    /// Scratch directory for downloads and encoder output
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Root of the local object store
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Publish to this S3 bucket (requires the `s3` feature)
    #[arg(long, env = "S3_BUCKET")]
    bucket: Option<String>,

    /// Merge master playlists by variant instead of by line position
    #[arg(long)]
    structural_merge: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = EncoderConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = EncodeSettings {
        work_dir: cli.work_dir.clone().unwrap_or(config.work_dir.clone()),
        targets: if cli.targets.is_empty() {
            config.targets.clone()
        } else {
            cli.targets.clone()
        },
        cpu: cli.cpu,
    };
    let merger: Box<dyn ManifestMerger> = if cli.structural_merge {
        Box::new(StructuralMerger)
    } else {
        Box::new(LinePositionMerger::default())
    };

    let bucket = cli.bucket.clone().or(config.s3_bucket.clone());
    let failures = match bucket {
        #[cfg(feature = "s3")]
        Some(bucket) => {
            let store = vidstream::adapters::aws::S3ObjectStore::from_env(bucket).await;
            encode_all(store, merger, settings, &cli.videos).await
        }
        #[cfg(not(feature = "s3"))]
        Some(_) => {
            tracing::error!("a bucket was given but the s3 feature is disabled");
            return Ok(ExitCode::FAILURE);
        }
        None => {
            let root = cli.storage_dir.clone().unwrap_or(config.storage_dir.clone());
            encode_all(FsObjectStore::new(root), merger, settings, &cli.videos).await
        }
    };

    if failures > 0 {
        tracing::error!(failures, total = cli.videos.len(), "some videos failed to encode");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Encode each video in turn, returning how many failed.
async fn encode_all<S: ObjectStore>(
    store: S,
    merger: Box<dyn ManifestMerger>,
    settings: EncodeSettings,
    videos: &[String],
) -> usize {
    let service = EncoderService::new(store, FfmpegRunner::new(), merger, settings);
    let mut failures = 0;
    for video_id in videos {
        match service.encode(video_id).await {
            Ok(report) => tracing::info!(
                video_id,
                source = %report.source,
                renditions = report.renditions,
                files = report.uploaded.len(),
                "video encoded"
            ),
            Err(e) => {
                tracing::error!(video_id, error = %e, "encoding failed");
                failures += 1;
            }
        }
    }
    failures
}

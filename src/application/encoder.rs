//! Out-of-band rendition encoding for published videos.

use crate::domain::ladder::{LadderError, RenditionLadder, MASTER_PLAYLIST};
use crate::domain::manifest::ManifestMerger;
use crate::domain::resolution::Resolution;
use crate::domain::video::{is_valid_id, keys, SOURCE_FILE};
use crate::ports::encoder::{EncoderError, EncoderRunner};
use crate::ports::storage::{ObjectStore, StoreError};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions of encoder outputs worth publishing.
const PUBLISHED_EXTENSIONS: [&str; 4] = ["m3u8", "m4s", "ts", "jpeg"];

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid video id {0}")]
    InvalidId(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error(transparent)]
    Ladder(#[from] LadderError),
    #[error("work directory error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot walk encoder output: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub work_dir: PathBuf,
    /// Renditions for the GPU path.
    pub targets: Vec<Resolution>,
    /// Use the CPU ladder derived from the source instead of `targets`.
    pub cpu: bool,
}

/// What one encoding run published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeReport {
    pub video_id: String,
    pub source: Resolution,
    pub renditions: usize,
    pub uploaded: Vec<String>,
}

pub struct EncoderService<S, E> {
    store: S,
    runner: E,
    merger: Box<dyn ManifestMerger>,
    settings: EncodeSettings,
}

impl<S, E> EncoderService<S, E>
where
    S: ObjectStore,
    E: EncoderRunner,
{
    pub fn new(
        store: S,
        runner: E,
        merger: Box<dyn ManifestMerger>,
        settings: EncodeSettings,
    ) -> Self {
        Self {
            store,
            runner,
            merger,
            settings,
        }
    }

    /// Encode one video. The work directory is removed whatever the outcome.
    pub async fn encode(&self, video_id: &str) -> Result<EncodeReport, EncodeError> {
        if !is_valid_id(video_id) {
            return Err(EncodeError::InvalidId(video_id.to_string()));
        }

        let work = self.settings.work_dir.join(video_id);
        tokio::fs::create_dir_all(&work).await?;

        let result = self.encode_in(video_id, &work).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work).await {
            tracing::warn!(
                video_id,
                work = %work.display(),
                error = %e,
                "cannot clean work directory"
            );
        }
        result
    }

    async fn encode_in(&self, video_id: &str, work: &Path) -> Result<EncodeReport, EncodeError> {
        let source = work.join(SOURCE_FILE);
        tracing::info!(video_id, "downloading source");
        self.store.download(&keys::source(video_id), &source).await?;

        let probe = self.runner.probe(&source).await?;
        tracing::info!(
            video_id,
            resolution = %probe.resolution,
            audio = probe.has_audio,
            "source probed"
        );

        let mut ladder = if self.settings.cpu {
            RenditionLadder::derive(probe.resolution)?
        } else {
            RenditionLadder::from_targets(probe.resolution, &self.settings.targets)?
        };
        if !probe.has_audio {
            ladder = ladder.without_audio();
        }

        let output = work.join("hls");
        tokio::fs::create_dir_all(&output).await?;
        let invocation = ladder.invocation(&source, &output);
        tracing::info!(video_id, rungs = ladder.rungs().len(), "encoding renditions");
        self.runner.run(&invocation).await?;

        self.merge_master(video_id, &invocation.master_playlist).await?;

        let mut uploaded = Vec::new();
        for (path, relative) in published_files(&output)? {
            let key = format!("{video_id}/{relative}");
            tracing::debug!(video_id, key, "uploading rendition file");
            self.store.upload(&path, &key).await?;
            uploaded.push(key);
        }
        tracing::info!(video_id, files = uploaded.len(), "renditions published");

        Ok(EncodeReport {
            video_id: video_id.to_string(),
            source: probe.resolution,
            renditions: ladder.rungs().len(),
            uploaded,
        })
    }

    /// Fold the fresh master playlist into the published one, when there is one.
    async fn merge_master(&self, video_id: &str, fresh_path: &Path) -> Result<(), EncodeError> {
        let key = keys::master(video_id);
        if !self.store.exists(&key).await? {
            tracing::debug!(video_id, "no published master playlist, keeping fresh one");
            return Ok(());
        }

        let existing = work_file(fresh_path, "published-master.m3u8");
        self.store.download(&key, &existing).await?;
        let existing_text = tokio::fs::read_to_string(&existing).await?;
        tokio::fs::remove_file(&existing).await?;

        let fresh_text = tokio::fs::read_to_string(fresh_path).await?;
        let merged = self.merger.merge(&existing_text, &fresh_text);
        tokio::fs::write(fresh_path, merged).await?;
        Ok(())
    }
}

fn work_file(sibling: &Path, name: &str) -> PathBuf {
    sibling
        .parent()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Files under `root` to publish, with their `/`-separated path relative to `root`.
fn published_files(root: &Path) -> Result<Vec<(PathBuf, String)>, EncodeError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let published = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| PUBLISHED_EXTENSIONS.contains(&e));
        if !published {
            tracing::debug!(path = %entry.path().display(), "skipping encoder output");
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), relative));
    }
    Ok(files)
}

//! In-process video metadata store.

use crate::domain::video::VideoAsset;
use crate::ports::repository::{RepositoryError, VideoRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    videos: RwLock<HashMap<String, VideoAsset>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_videos(videos: impl IntoIterator<Item = VideoAsset>) -> Self {
        Self {
            videos: RwLock::new(videos.into_iter().map(|v| (v.id.clone(), v)).collect()),
        }
    }

    /// Seed from a JSON array of videos.
    pub async fn from_catalog(path: &Path) -> Result<Self, RepositoryError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RepositoryError::Backend(format!("{}: {e}", path.display())))?;
        let videos: Vec<VideoAsset> = serde_json::from_str(&raw)
            .map_err(|e| RepositoryError::Backend(format!("{}: {e}", path.display())))?;
        Ok(Self::with_videos(videos))
    }

    async fn update<F>(&self, id: &str, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut VideoAsset) + Send,
    {
        let mut videos = self.videos.write().await;
        let video = videos
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        apply(video);
        Ok(())
    }
}

#[async_trait]
impl VideoRepository for InMemoryRepository {
    async fn get_video(&self, id: &str) -> Result<VideoAsset, RepositoryError> {
        self.videos
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<VideoAsset>, RepositoryError> {
        Ok(self
            .videos
            .read()
            .await
            .values()
            .find(|v| v.title == title)
            .cloned())
    }

    async fn update_cover(&self, id: &str, cover_key: &str) -> Result<(), RepositoryError> {
        self.update(id, |v| v.cover_key = Some(cover_key.to_string()))
            .await
    }

    async fn update_subtitles(&self, id: &str, subtitle_key: &str) -> Result<(), RepositoryError> {
        self.update(id, |v| v.subtitle_key = Some(subtitle_key.to_string()))
            .await
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), RepositoryError> {
        self.update(id, |v| v.title = title.to_string()).await
    }
}

use crate::domain::video::VideoAsset;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("video {0} not found")]
    NotFound(String),
    #[error("metadata store error: {0}")]
    Backend(String),
}

/// Video metadata store. Writes are single-field updates, applied one at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn get_video(&self, id: &str) -> Result<VideoAsset, RepositoryError>;

    async fn find_by_title(&self, title: &str) -> Result<Option<VideoAsset>, RepositoryError>;

    async fn update_cover(&self, id: &str, cover_key: &str) -> Result<(), RepositoryError>;

    async fn update_subtitles(&self, id: &str, subtitle_key: &str) -> Result<(), RepositoryError>;

    async fn update_title(&self, id: &str, title: &str) -> Result<(), RepositoryError>;
}

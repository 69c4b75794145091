//! Editing a video's title, cover and subtitles.

use crate::domain::video::{is_valid_id, keys, VideoAsset};
use crate::error::ApiError;
use crate::ports::repository::VideoRepository;
use crate::ports::storage::ObjectStore;
use bytes::Bytes;
use image::ImageFormat;
use std::sync::Arc;

/// A file field from the edit form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct VideoEdit {
    pub title: Option<String>,
    pub cover: Option<Upload>,
    pub subs: Option<Upload>,
}

const COVER_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Identify a cover image by its leading bytes.
pub fn sniff_cover(data: &[u8]) -> Result<ImageFormat, ApiError> {
    image::guess_format(data)
        .ok()
        .filter(|format| COVER_FORMATS.contains(format))
        .ok_or_else(|| {
            ApiError::UnsupportedMedia("cover must be a PNG, JPEG, GIF or WebP image".to_string())
        })
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ObjectStore>,
    repo: Arc<dyn VideoRepository>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn ObjectStore>, repo: Arc<dyn VideoRepository>) -> Self {
        Self { store, repo }
    }

    pub async fn get(&self, id: &str) -> Result<VideoAsset, ApiError> {
        if !is_valid_id(id) {
            return Err(ApiError::Validation(format!("invalid video id {id}")));
        }
        Ok(self.repo.get_video(id).await?)
    }

    /// Apply an edit. Everything that can be rejected is checked before the
    /// first write. Writes then go cover, subtitles, title. A failed cover
    /// metadata update removes the uploaded cover unless it landed on the
    /// published cover's key; later failures leave earlier writes in place.
    pub async fn edit(&self, id: &str, edit: VideoEdit) -> Result<VideoAsset, ApiError> {
        let title = edit
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Validation("missing title".to_string()))?
            .to_string();

        let video = self.get(id).await?;

        if let Some(cover) = &edit.cover {
            sniff_cover(&cover.data)?;
        }

        if let Some(other) = self.repo.find_by_title(&title).await? {
            if other.id != video.id {
                return Err(ApiError::Conflict(format!("title '{title}' is already used")));
            }
        }

        if let Some(cover) = edit.cover {
            let key = keys::cover(id, &cover.file_name);
            self.store.put(&key, cover.data).await?;
            if let Err(e) = self.repo.update_cover(id, &key).await {
                // the published cover lives under the same key; keep it
                if video.cover_key.as_deref() == Some(key.as_str()) {
                    tracing::error!(video_id = id, key, error = %e, "cover metadata update failed");
                    return Err(e.into());
                }
                tracing::error!(
                    video_id = id,
                    key,
                    error = %e,
                    "cover metadata update failed, removing upload"
                );
                if let Err(cleanup) = self.store.delete(&key).await {
                    tracing::warn!(
                        video_id = id,
                        key,
                        error = %cleanup,
                        "cannot remove orphaned cover"
                    );
                }
                return Err(e.into());
            }
        }

        if let Some(subs) = edit.subs {
            let key = keys::subtitles(id, &subs.file_name);
            self.store.put(&key, subs.data).await?;
            self.repo
                .update_subtitles(id, &key)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        video_id = id,
                        key,
                        error = %e,
                        "subtitle metadata update failed"
                    )
                })?;
        }

        if title != video.title {
            self.repo
                .update_title(id, &title)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        video_id = id,
                        error = %e,
                        "title update failed after earlier writes"
                    )
                })?;
        }

        tracing::info!(video_id = id, title, "video edited");
        Ok(self.repo.get_video(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::{FsObjectStore, InMemoryRepository};
    use crate::ports::repository::{MockVideoRepository, RepositoryError};
    use crate::ports::storage::MockObjectStore;
    use axum::http::StatusCode;

    const ID: &str = "b6b863b1-14a1-4685-8097-5ac834b742f8";
    const OTHER: &str = "0c2f9d7e-8a55-4b1f-9d0e-5f4a1c3b2a10";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn upload(name: &str, data: &'static [u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_sniff_cover() {
        assert_eq!(sniff_cover(PNG).unwrap(), ImageFormat::Png);
        assert_eq!(sniff_cover(b"\xff\xd8\xff\xe0\0\x10JFIF").unwrap(), ImageFormat::Jpeg);
        assert!(matches!(
            sniff_cover(b"%PDF-1.7"),
            Err(ApiError::UnsupportedMedia(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_writes_cover_subtitles_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        let repo = Arc::new(InMemoryRepository::with_videos([VideoAsset::new(ID, "ocean")]));
        let catalog = CatalogService::new(store.clone(), repo);

        let video = catalog
            .edit(
                ID,
                VideoEdit {
                    title: Some("deep ocean".to_string()),
                    cover: Some(upload("shot.png", PNG)),
                    subs: Some(upload("en.vtt", b"WEBVTT\n")),
                },
            )
            .await
            .unwrap();

        assert_eq!(video.title, "deep ocean");
        assert_eq!(video.cover_key.as_deref(), Some(format!("{ID}/cover.png").as_str()));
        assert_eq!(video.subtitle_key.as_deref(), Some(format!("{ID}/subs.vtt").as_str()));
        assert!(store.exists(&format!("{ID}/cover.png")).await.unwrap());
        assert!(store.exists(&format!("{ID}/subs.vtt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_cover_writes_nothing() {
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let mut repo = MockVideoRepository::new();
        repo.expect_get_video()
            .returning(|id| Ok(VideoAsset::new(id, "ocean")));
        repo.expect_find_by_title().returning(|_| Ok(None));
        repo.expect_update_cover().never();
        repo.expect_update_subtitles().never();
        repo.expect_update_title().never();

        let catalog = CatalogService::new(Arc::new(store), Arc::new(repo));
        let err = catalog
            .edit(
                ID,
                VideoEdit {
                    title: Some("renamed".to_string()),
                    cover: Some(upload("cover.pdf", b"%PDF-1.7")),
                    subs: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_title_conflict_keeps_original_title() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::with_videos([
            VideoAsset::new(ID, "ocean"),
            VideoAsset::new(OTHER, "mountain"),
        ]));
        let catalog = CatalogService::new(Arc::new(FsObjectStore::new(dir.path())), repo.clone());

        let err = catalog
            .edit(
                ID,
                VideoEdit {
                    title: Some("mountain".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(repo.get_video(ID).await.unwrap().title, "ocean");
    }

    #[tokio::test]
    async fn test_keeping_own_title_is_not_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::with_videos([VideoAsset::new(ID, "ocean")]));
        let catalog = CatalogService::new(Arc::new(FsObjectStore::new(dir.path())), repo);

        let video = catalog
            .edit(
                ID,
                VideoEdit {
                    title: Some("ocean".to_string()),
                    subs: Some(upload("fr.srt", b"1\n00:00:00,000 --> 00:00:01,000\nsalut\n")),
                    cover: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(video.subtitle_key.as_deref(), Some(format!("{ID}/subs.srt").as_str()));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let catalog = CatalogService::new(Arc::new(FsObjectStore::new(dir.path())), repo);

        let missing_title = catalog.edit(ID, VideoEdit::default()).await.unwrap_err();
        assert_eq!(missing_title.status(), StatusCode::BAD_REQUEST);

        let edit = VideoEdit {
            title: Some("x".to_string()),
            ..Default::default()
        };
        let bad_id = catalog.edit("nope", edit.clone()).await.unwrap_err();
        assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);

        let unknown = catalog.edit(ID, edit).await.unwrap_err();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_cover_metadata_removes_upload() {
        let cover_key = format!("{ID}/cover.png");

        let mut store = MockObjectStore::new();
        let expected = cover_key.clone();
        store
            .expect_put()
            .withf(move |key, _| key == expected)
            .times(1)
            .returning(|_, _| Ok(()));
        let expected = cover_key.clone();
        store
            .expect_delete()
            .withf(move |key| key == expected)
            .times(1)
            .returning(|_| Ok(()));

        let mut repo = MockVideoRepository::new();
        repo.expect_get_video()
            .returning(|id| Ok(VideoAsset::new(id, "ocean")));
        repo.expect_find_by_title().returning(|_| Ok(None));
        repo.expect_update_cover()
            .returning(|_, _| Err(RepositoryError::Backend("connection reset".to_string())));
        repo.expect_update_title().never();

        let catalog = CatalogService::new(Arc::new(store), Arc::new(repo));
        let err = catalog
            .edit(
                ID,
                VideoEdit {
                    title: Some("renamed".to_string()),
                    cover: Some(upload("cover.png", PNG)),
                    subs: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_failed_cover_metadata_keeps_published_cover() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        let cover_key = format!("{ID}/cover.png");
        store.put(&cover_key, Bytes::from_static(PNG)).await.unwrap();

        let mut repo = MockVideoRepository::new();
        let published = cover_key.clone();
        repo.expect_get_video().returning(move |id| {
            let mut video = VideoAsset::new(id, "ocean");
            video.cover_key = Some(published.clone());
            Ok(video)
        });
        repo.expect_find_by_title().returning(|_| Ok(None));
        repo.expect_update_cover()
            .returning(|_, _| Err(RepositoryError::Backend("connection reset".to_string())));
        repo.expect_update_title().never();

        let catalog = CatalogService::new(store.clone(), Arc::new(repo));
        let err = catalog
            .edit(
                ID,
                VideoEdit {
                    title: Some("ocean".to_string()),
                    cover: Some(upload("new.png", PNG)),
                    subs: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.exists(&cover_key).await.unwrap());
    }
}

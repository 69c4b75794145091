use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SOURCE_FILE: &str = "source.mp4";
pub const MASTER_FILE: &str = "master.m3u8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAsset {
    pub id: String,
    pub title: String,
    pub source_key: String,
    #[serde(default)]
    pub cover_key: Option<String>,
    #[serde(default)]
    pub subtitle_key: Option<String>,
}

impl VideoAsset {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source_key: keys::source(&id),
            id,
            title: title.into(),
            cover_key: None,
            subtitle_key: None,
        }
    }

    /// Download name of the source file, always ending in `.mp4`.
    pub fn download_name(&self) -> String {
        if self.title.ends_with(".mp4") {
            self.title.clone()
        } else {
            format!("{}.mp4", self.title)
        }
    }
}

pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Object store key layout.
pub mod keys {
    use super::{MASTER_FILE, SOURCE_FILE};
    use std::path::Path;

    pub fn source(id: &str) -> String {
        format!("{id}/{SOURCE_FILE}")
    }

    pub fn master(id: &str) -> String {
        format!("{id}/{MASTER_FILE}")
    }

    pub fn segment(id: &str, quality: &str, filename: &str) -> String {
        format!("{id}/{quality}/{filename}")
    }

    pub fn subtitle_file(id: &str, filename: &str) -> String {
        format!("{id}/{filename}")
    }

    pub fn cover(id: &str, upload_name: &str) -> String {
        format!("{id}/cover{}", extension(upload_name))
    }

    pub fn subtitles(id: &str, upload_name: &str) -> String {
        format!("{id}/subs{}", extension(upload_name))
    }

    fn extension(name: &str) -> String {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub video_id: String,
    pub quality: String,
    pub filename: String,
    pub filter_chain: Vec<String>,
}

impl SegmentRequest {
    pub fn new(
        video_id: impl Into<String>,
        quality: impl Into<String>,
        filename: impl Into<String>,
        filters: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            quality: quality.into(),
            filename: filename.into(),
            filter_chain: filters.into_iter().filter(|f| !f.is_empty()).collect(),
        }
    }

    pub fn key(&self) -> String {
        keys::segment(&self.video_id, &self.quality, &self.filename)
    }

    /// Index playlists and filterless requests are served straight from the store.
    pub fn bypasses_transformation(&self) -> bool {
        self.filename.contains("segment_index") || self.filter_chain.is_empty()
    }
}

/// Content type by file extension.
pub fn content_type(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "mp4" | "m4v" => "video/mp4",
        "m3u8" => "application/vnd.apple.mpegurl",
        "m4s" => "video/iso.segment",
        "ts" => "video/mp2t",
        "vtt" => "text/vtt",
        "srt" => "application/x-subrip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

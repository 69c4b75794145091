//! Master playlist merging.
//!
//! Renditions are added to an already published asset by encoding them into a
//! fresh master playlist and folding its variant entries into the existing one.

/// Combines a published master playlist with a freshly generated one.
pub trait ManifestMerger: Send + Sync {
    fn merge(&self, existing: &str, fresh: &str) -> String;
}

/// Line-position merge: the first `keep` lines of the existing playlist
/// followed by the fresh playlist from line `skip` onward.
///
/// Assumes both playlists share the header shape ffmpeg writes; a header that
/// grows or shrinks shifts the cut points. Short inputs are clamped.
#[derive(Debug, Clone, Copy)]
pub struct LinePositionMerger {
    pub keep: usize,
    pub skip: usize,
}

impl Default for LinePositionMerger {
    fn default() -> Self {
        Self { keep: 5, skip: 2 }
    }
}

impl ManifestMerger for LinePositionMerger {
    fn merge(&self, existing: &str, fresh: &str) -> String {
        existing
            .split('\n')
            .take(self.keep)
            .chain(fresh.split('\n').skip(self.skip))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

const STREAM_INF: &str = "#EXT-X-STREAM-INF";

/// One `#EXT-X-STREAM-INF` tag and the URI line that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantStream {
    pub attributes: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterPlaylist {
    /// Tags that are not part of a variant entry (`#EXTM3U`, `#EXT-X-VERSION`, media tags).
    pub header: Vec<String>,
    pub variants: Vec<VariantStream>,
}

impl MasterPlaylist {
    pub fn parse(text: &str) -> Self {
        let mut playlist = MasterPlaylist::default();
        let mut pending: Option<String> = None;

        for line in text.lines().map(str::trim_end) {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(STREAM_INF) {
                pending = Some(line.to_string());
            } else if line.starts_with('#') {
                // tags outside variant entries, wherever they appear
                if !playlist.header.iter().any(|h| h == line) {
                    playlist.header.push(line.to_string());
                }
            } else if let Some(attributes) = pending.take() {
                playlist.variants.push(VariantStream {
                    attributes,
                    uri: line.to_string(),
                });
            }
        }

        playlist
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        for variant in &self.variants {
            out.push_str(&variant.attributes);
            out.push('\n');
            out.push_str(&variant.uri);
            out.push('\n');
        }
        out
    }
}

/// Merge by parsing variant entries: the existing playlist is kept whole and
/// fresh variants are appended unless their URI is already published.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralMerger;

impl ManifestMerger for StructuralMerger {
    fn merge(&self, existing: &str, fresh: &str) -> String {
        let mut merged = MasterPlaylist::parse(existing);
        let fresh = MasterPlaylist::parse(fresh);

        if merged.header.is_empty() {
            merged.header = fresh.header.clone();
        }
        for variant in fresh.variants {
            if !merged.variants.iter().any(|v| v.uri == variant.uri) {
                merged.variants.push(variant);
            }
        }

        merged.render()
    }
}

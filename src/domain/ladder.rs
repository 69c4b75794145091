//! Adaptive-bitrate ladder derivation and the ffmpeg invocation that encodes it.
//!
//! A ladder is derived from the probed source resolution. Its rungs are
//! accumulated in order, each one contributing a `-map` pair and a
//! `v:i,a:i` entry to `-var_stream_map`, and the whole ladder is written by a
//! single ffmpeg process as HLS renditions plus a master playlist.

use super::resolution::Resolution;
use std::fmt;
use std::path::{Path, PathBuf};

/// Below this size in both dimensions a source is refused.
pub const FLOOR: Resolution = Resolution::new(640, 480);
pub const FULL_HD: Resolution = Resolution::new(1920, 1080);

pub const SEGMENT_SECONDS: u32 = 6;
pub const MASTER_PLAYLIST: &str = "master.m3u8";
pub const SEGMENT_INDEX: &str = "segment_index.m3u8";

const CRF: &str = "23";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LadderError {
    #[error("resolution ({}, {}) is below minimal resolution ({})", .0.width, .0.height, FLOOR)]
    BelowFloor(Resolution),
    #[error("no target renditions requested")]
    NoTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPath {
    Cpu,
    Gpu,
}

impl CodecPath {
    pub fn codec(&self) -> &'static str {
        match self {
            CodecPath::Cpu => "libx264",
            CodecPath::Gpu => "h264_nvenc",
        }
    }

    /// Directory prefix of every rendition. GPU ladders are produced for assets
    /// that already have published renditions, hence the distinct prefix.
    fn rendition_prefix(&self) -> &'static str {
        match self {
            CodecPath::Cpu => "v",
            CodecPath::Gpu => "v0",
        }
    }

    fn input_args(&self, input: &Path) -> Vec<String> {
        let input = input.to_string_lossy().into_owned();
        match self {
            CodecPath::Cpu => strings([
                "-y",
                "-i",
                input.as_str(),
                "-vcodec",
                "copy",
                "-preset",
                "fast",
            ]),
            CodecPath::Gpu => strings([
                "-y",
                "-i",
                input.as_str(),
                "-vcodec",
                self.codec(),
                "-preset",
                "fast",
                "-g",
                "48",
                "-sc_threshold",
                "0",
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rung {
    /// The source video stream, copied untouched.
    Copy,
    /// Constant-quality re-encode at a fixed size.
    Scaled(Resolution),
    /// Re-encode at a fixed size and bitrate.
    Target(Resolution),
}

impl Rung {
    fn video_args(&self, index: usize, path: CodecPath) -> Vec<String> {
        match self {
            Rung::Copy => vec![format!("-c:v:{index}"), "copy".to_string()],
            Rung::Scaled(res) => vec![
                format!("-s:v:{index}"),
                res.size(),
                format!("-c:v:{index}"),
                path.codec().to_string(),
                "-crf".to_string(),
                CRF.to_string(),
            ],
            Rung::Target(res) => vec![
                format!("-s:v:{index}"),
                res.size(),
                format!("-c:v:{index}"),
                path.codec().to_string(),
                format!("-b:v:{index}"),
                res.bitrate.to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionLadder {
    path: CodecPath,
    rungs: Vec<Rung>,
    audio: bool,
}

fn check_floor(source: &Resolution) -> Result<(), LadderError> {
    // Refused only when short in both dimensions: a narrow but tall source passes.
    if source.width < FLOOR.width && source.height < FLOOR.height {
        return Err(LadderError::BelowFloor(*source));
    }
    Ok(())
}

impl RenditionLadder {
    /// CPU ladder: the copied source plus threshold-derived rungs.
    pub fn derive(source: Resolution) -> Result<Self, LadderError> {
        check_floor(&source)?;

        let mut rungs = vec![Rung::Copy];
        if FLOOR.strictly_greater(&source) {
            rungs.push(Rung::Scaled(FLOOR));
        }
        if source.strictly_greater(&FULL_HD) {
            rungs.push(Rung::Scaled(FULL_HD));
        }

        Ok(Self {
            path: CodecPath::Cpu,
            rungs,
            audio: true,
        })
    }

    /// GPU ladder: one rung per caller-supplied target, each at its own bitrate.
    pub fn from_targets(source: Resolution, targets: &[Resolution]) -> Result<Self, LadderError> {
        check_floor(&source)?;
        if targets.is_empty() {
            return Err(LadderError::NoTargets);
        }

        Ok(Self {
            path: CodecPath::Gpu,
            rungs: targets.iter().copied().map(Rung::Target).collect(),
            audio: true,
        })
    }

    /// Drop the audio half of every stream mapping, for sources with no audio track.
    pub fn without_audio(mut self) -> Self {
        self.audio = false;
        self
    }

    pub fn rungs(&self) -> &[Rung] {
        &self.rungs
    }

    pub fn codec_path(&self) -> CodecPath {
        self.path
    }

    pub fn invocation(&self, input: &Path, output_dir: &Path) -> TranscodeInvocation {
        let mut maps = Vec::new();
        let mut targets = Vec::new();
        let mut stream_map = Vec::new();

        for (i, rung) in self.rungs.iter().enumerate() {
            maps.extend(strings(["-map", "0:0"]));
            if self.audio {
                maps.extend(strings(["-map", "0:1"]));
                stream_map.push(format!("v:{i},a:{i}"));
            } else {
                stream_map.push(format!("v:{i}"));
            }
            targets.extend(rung.video_args(i, self.path));
        }

        let rendition_dir = output_dir.join(format!("{}%v", self.path.rendition_prefix()));
        let segment_pattern = rendition_dir.join("segment%d.m4s");
        let index_pattern = rendition_dir.join(SEGMENT_INDEX);

        let mut args = self.path.input_args(input);
        args.extend(maps);
        args.extend(targets);
        args.extend(strings(["-c:a", "copy"]));
        args.push("-var_stream_map".to_string());
        args.push(stream_map.join(" "));
        args.extend(strings(["-master_pl_name", MASTER_PLAYLIST, "-f", "hls"]));
        args.push("-hls_time".to_string());
        args.push(SEGMENT_SECONDS.to_string());
        args.extend(strings([
            "-hls_playlist_type",
            "vod",
            "-hls_segment_type",
            "fmp4",
            "-hls_list_size",
            "0",
            "-hls_segment_filename",
        ]));
        args.push(segment_pattern.to_string_lossy().into_owned());
        args.push(index_pattern.to_string_lossy().into_owned());

        TranscodeInvocation {
            program: "ffmpeg".to_string(),
            args,
            codec_path: self.path,
            master_playlist: output_dir.join(MASTER_PLAYLIST),
        }
    }
}

/// A fully formed external encoder command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub codec_path: CodecPath,
    /// Where the encoder writes the master playlist.
    pub master_playlist: PathBuf,
}

impl fmt::Display for TranscodeInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

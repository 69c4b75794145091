use crate::domain::ladder::TranscodeInvocation;
use crate::domain::resolution::Resolution;
use crate::ports::encoder::{EncoderError, EncoderRunner, SourceProbe};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::process::Output;
use std::sync::OnceLock;
use tokio::process::Command;

/// Runs the ffmpeg/ffprobe binaries found on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    pub fn new() -> Self {
        Self
    }
}

async fn output_of(command: &mut Command, program: &str) -> Result<Output, EncoderError> {
    let output = command.output().await.map_err(|source| EncoderError::Spawn {
        program: program.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(EncoderError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Parse `WIDTHxHEIGHT[xBITRATE]` as printed by
/// `ffprobe -show_entries stream=width,height,bit_rate -of csv=s=x:p=0`.
///
/// ffprobe sometimes prints several lines for a single video track; the first wins.
/// A missing bitrate (`N/A`) reads as 0.
pub fn parse_resolution(output: &str) -> Result<Resolution, EncoderError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)x(\d+)(?:x(\d+|N/A))?").expect("static resolution pattern")
    });

    let first_line = output.lines().next().unwrap_or("").trim();
    let caps = pattern
        .captures(first_line)
        .ok_or_else(|| EncoderError::Probe(first_line.to_string()))?;

    let number = |i: usize| -> Result<u64, EncoderError> {
        match caps.get(i).map(|m| m.as_str()) {
            None | Some("N/A") => Ok(0),
            Some(digits) => digits
                .parse()
                .map_err(|_| EncoderError::Probe(first_line.to_string())),
        }
    };

    Ok(Resolution {
        width: number(1)?,
        height: number(2)?,
        bitrate: number(3)?,
    })
}

#[async_trait]
impl EncoderRunner for FfmpegRunner {
    async fn probe(&self, source: &Path) -> Result<SourceProbe, EncoderError> {
        let video = output_of(
            Command::new("ffprobe")
                .arg("-v")
                .arg("error")
                .arg("-select_streams")
                .arg("v:0")
                .arg("-show_entries")
                .arg("stream=width,height,bit_rate")
                .arg("-of")
                .arg("csv=s=x:p=0")
                .arg(source),
            "ffprobe",
        )
        .await?;
        let resolution = parse_resolution(&String::from_utf8_lossy(&video.stdout))?;

        let audio = output_of(
            Command::new("ffprobe")
                .arg("-v")
                .arg("error")
                .arg("-select_streams")
                .arg("a")
                .arg("-show_entries")
                .arg("stream=index")
                .arg("-of")
                .arg("csv=p=0")
                .arg(source),
            "ffprobe",
        )
        .await?;
        let has_audio = !String::from_utf8_lossy(&audio.stdout).trim().is_empty();

        Ok(SourceProbe {
            resolution,
            has_audio,
        })
    }

    async fn run(&self, invocation: &TranscodeInvocation) -> Result<(), EncoderError> {
        tracing::debug!(command = %invocation, "running encoder");
        let output = output_of(
            Command::new(&invocation.program).args(&invocation.args),
            &invocation.program,
        )
        .await?;
        tracing::debug!(
            stderr = %String::from_utf8_lossy(&output.stderr),
            "encoder finished"
        );
        Ok(())
    }
}

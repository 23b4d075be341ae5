//! Frame-sampling subtitle producer.
//!
//! Decodes one frame every `frame_interval_ms` with FFmpeg, reads the text in
//! the configured region with Tesseract and hands the samples to the
//! [`Consolidator`](crate::consolidate::Consolidator).

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::consolidate::Consolidator;
use crate::cue::{Cue, Sample};
use crate::region::SubtitleRegion;

/// A decoded (and already cropped) frame on disk
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp_ms: u64,
    pub path: PathBuf,
}

/// Something that can decode the frame shown at a given timestamp
pub trait FrameSource {
    /// Returns `None` once the timestamp is past the end of the video.
    fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<Frame>>;
}

/// Something that can read text from a frame
pub trait TextRecognizer {
    fn recognize(&self, frame: &Frame) -> Result<String>;
}

/// Decodes single frames with FFmpeg into a scratch directory.
///
/// The scratch directory is removed when the source is dropped.
pub struct FfmpegFrameSource {
    video_file: PathBuf,
    region: SubtitleRegion,
    /// Container duration; `None` when ffprobe cannot tell
    duration_ms: Option<u64>,
    scratch: TempDir,
}

impl FfmpegFrameSource {
    pub fn open(video_file: &Path, region: SubtitleRegion) -> Result<Self> {
        if !video_file.exists() {
            return Err(anyhow!("Video file not found: {}", video_file.display()));
        }
        let duration_ms = video_duration_ms(video_file)?;
        match duration_ms {
            Some(ms) => debug!("Video duration: {} ms", ms),
            None => warn!("Video duration unknown, scanning until no frame is decoded"),
        }
        let scratch = tempfile::tempdir().context("Failed to create frame scratch directory")?;
        Ok(Self {
            video_file: video_file.to_path_buf(),
            region,
            duration_ms,
            scratch,
        })
    }
}

/// Read the container duration with ffprobe
fn video_duration_ms(video_file: &Path) -> Result<Option<u64>> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(["-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(video_file)
        .output()
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe could not read video: {}", stderr.trim()));
    }

    Ok(parse_duration_ms(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse ffprobe's duration output ("12.345000" seconds, or "N/A")
fn parse_duration_ms(stdout: &str) -> Option<u64> {
    let seconds: f64 = stdout.lines().next()?.trim().parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some((seconds * 1000.0).round() as u64)
    } else {
        None
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<Frame>> {
        if matches!(self.duration_ms, Some(duration) if timestamp_ms >= duration) {
            return Ok(None);
        }

        let frame_path = self.scratch.path().join("frame.png");
        let _ = fs::remove_file(&frame_path);

        let seek = format!("{}.{:03}", timestamp_ms / 1000, timestamp_ms % 1000);
        let output = Command::new("ffmpeg")
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-ss", &seek])
            .arg("-i")
            .arg(&self.video_file)
            .args(["-frames:v", "1"])
            .args(["-vf", &self.region.get_ffmpeg_filter()])
            .arg(&frame_path)
            .output()
            .context("Failed to run ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "ffmpeg could not decode frame at {} ms: {}",
                timestamp_ms,
                stderr.trim()
            ));
        }

        let decoded = fs::metadata(&frame_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        if decoded {
            Ok(Some(Frame {
                timestamp_ms,
                path: frame_path,
            }))
        } else {
            // The last frame can end slightly before the container duration
            debug!("No frame at {} ms, end of stream", timestamp_ms);
            Ok(None)
        }
    }
}

/// Reads text with the tesseract CLI
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    pub language: String,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
        }
    }
}

impl TesseractRecognizer {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, frame: &Frame) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(&frame.path)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--oem", "3", "--psm", "6"])
            .output()
            .context("Failed to run tesseract")?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!("tesseract failed: {}", stderr.trim()))
        }
    }
}

/// Scan the video from 0 ms until the source runs out of frames and build cues
pub fn generate_subtitles_ocr<S, R>(
    source: &mut S,
    recognizer: &R,
    frame_interval_ms: u64,
) -> Result<Vec<Cue>>
where
    S: FrameSource + ?Sized,
    R: TextRecognizer + ?Sized,
{
    let mut consolidator = Consolidator::new(frame_interval_ms)?;
    let mut cues = Vec::new();
    let mut current_time = 0u64;

    while let Some(frame) = source.frame_at(current_time)? {
        // A recognition failure is treated as "nothing recognized"
        let text = recognizer.recognize(&frame).unwrap_or_else(|e| {
            warn!("[{} ms] OCR failed: {}", current_time, e);
            String::new()
        });
        debug!("[{} ms] OCR: '{}'", current_time, text);

        cues.extend(consolidator.push(Sample::new(current_time, text)));
        current_time += frame_interval_ms;
    }

    cues.extend(consolidator.finish());
    info!(
        "Scanned {} ms of video, built {} subtitle(s)",
        current_time,
        cues.len()
    );
    Ok(cues)
}

/// Open the video with FFmpeg and Tesseract and run the sampling scan
pub fn scan_video(
    video_file: &Path,
    region: SubtitleRegion,
    ocr_language: &str,
    frame_interval_ms: u64,
) -> Result<Vec<Cue>> {
    info!(
        "Sampling frames every {} ms ({})",
        frame_interval_ms,
        region.description()
    );
    let mut source = FfmpegFrameSource::open(video_file, region)?;
    let recognizer = TesseractRecognizer::new(ocr_language);
    generate_subtitles_ocr(&mut source, &recognizer, frame_interval_ms)
}

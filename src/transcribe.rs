use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::cue::Cue;

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Get approximate model size for display
    pub fn size_display(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "~75 MB",
            WhisperModel::Base => "~142 MB",
            WhisperModel::Small => "~466 MB",
            WhisperModel::Medium => "~1.5 GB",
            WhisperModel::Large => "~2.9 GB",
        }
    }

    /// Get the ggml model filename for whisper.cpp
    pub fn ggml_filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large-v3.bin",
        }
    }

    /// Get HuggingFace download URL for the model
    pub fn download_url(&self) -> String {
        format!(
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
            self.ggml_filename()
        )
    }
}

/// Speech-to-text engine to use
#[derive(Debug, Clone, Copy, PartialEq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum TranscriptionBackend {
    /// whisper.cpp binary (no Python needed)
    #[default]
    WhisperCpp,
    /// Python faster-whisper
    FasterWhisper,
}

impl TranscriptionBackend {
    /// Pick whatever is installed, preferring whisper.cpp
    pub fn detect() -> Self {
        if check_whisper_cpp_available() {
            TranscriptionBackend::WhisperCpp
        } else if check_python_available() {
            TranscriptionBackend::FasterWhisper
        } else {
            TranscriptionBackend::WhisperCpp // Default, will show error later
        }
    }
}

/// Transcription configuration
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub model: WhisperModel,
    pub beam_size: u32,
    /// `None` lets the model detect the spoken language
    pub language: Option<String>,
    pub backend: TranscriptionBackend,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: WhisperModel::Small,
            beam_size: 5,
            language: None,
            backend: TranscriptionBackend::WhisperCpp,
        }
    }
}

impl TranscriptionConfig {
    pub fn new(model: WhisperModel, beam_size: u32, language: Option<&str>) -> Self {
        Self {
            model,
            beam_size: beam_size.max(1),
            language: language.map(str::to_string),
            backend: TranscriptionBackend::detect(),
        }
    }

    pub fn with_backend(mut self, backend: TranscriptionBackend) -> Self {
        self.backend = backend;
        self
    }
}

/// One segment returned by the speech-to-text engine, times in seconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Speech-to-text over a whole audio or video file
pub trait Transcriber {
    fn transcribe(&self, media_file: &Path) -> Result<Vec<TranscriptSegment>>;
}

/// Get the whisper.cpp models directory
pub fn get_whisper_cpp_models_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        return home.join(".cache").join("whisper.cpp");
    }

    // Fallback to current directory
    PathBuf::from("models")
}

const WHISPER_CPP_BINARIES: [&str; 4] = ["whisper-cli", "whisper", "whisper-cpp", "main"];

/// Check if whisper.cpp binary is available
pub fn check_whisper_cpp_available() -> bool {
    get_whisper_cpp_binary().is_some()
}

/// Get the whisper.cpp binary path
fn get_whisper_cpp_binary() -> Option<String> {
    for name in WHISPER_CPP_BINARIES {
        if which::which(name).is_ok() {
            return Some(name.to_string());
        }
    }

    // Check in current directory
    for name in WHISPER_CPP_BINARIES {
        for candidate in [format!("{}.exe", name), name.to_string()] {
            if Path::new(&candidate).exists() {
                return Some(format!("./{}", candidate));
            }
        }
    }

    None
}

/// Check if the whisper.cpp model exists
pub fn check_whisper_model_exists(model: WhisperModel) -> bool {
    get_whisper_cpp_models_dir()
        .join(model.ggml_filename())
        .exists()
}

/// Download whisper.cpp model using curl
pub fn download_whisper_model(model: WhisperModel) -> Result<PathBuf> {
    let models_dir = get_whisper_cpp_models_dir();
    fs::create_dir_all(&models_dir)
        .with_context(|| format!("Failed to create {}", models_dir.display()))?;

    let model_path = models_dir.join(model.ggml_filename());

    if model_path.exists() {
        debug!("Model already exists: {}", model_path.display());
        return Ok(model_path);
    }

    let url = model.download_url();
    info!(
        "Downloading {} model ({}) to {}",
        model,
        model.size_display(),
        model_path.display()
    );

    let status = Command::new("curl")
        .args(["-L", "--fail", "-o"])
        .arg(&model_path)
        .arg(&url)
        .args(["--progress-bar"])
        .status();

    match status {
        Ok(s) if s.success() => {
            info!("Model downloaded successfully");
            Ok(model_path)
        }
        _ => {
            let _ = fs::remove_file(&model_path);
            Err(anyhow!(
                "Failed to download model. Please download manually from:\n  {}\n  and save to: {}",
                url,
                model_path.display()
            ))
        }
    }
}

/// Extract audio from video using FFmpeg (required for whisper.cpp)
fn extract_audio(video_file: &Path, audio_file: &Path) -> Result<()> {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .arg("-i")
        .arg(video_file)
        .args(["-ar", "16000"]) // 16kHz sample rate required by Whisper
        .args(["-ac", "1"]) // Mono
        .args(["-c:a", "pcm_s16le"]) // 16-bit PCM
        .arg(audio_file)
        .status()
        .context("Failed to run ffmpeg")?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("Failed to extract audio from video"))
    }
}

#[derive(Debug, Deserialize)]
struct WhisperCppOutput {
    #[serde(default)]
    transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperCppSegment {
    offsets: WhisperCppOffsets,
    text: String,
}

/// Segment bounds in milliseconds
#[derive(Debug, Deserialize)]
struct WhisperCppOffsets {
    from: u64,
    to: u64,
}

/// Parse whisper.cpp JSON output (`--output-json`) into segments
fn parse_whisper_json(content: &str) -> Result<Vec<TranscriptSegment>> {
    let output: WhisperCppOutput =
        serde_json::from_str(content).context("Invalid whisper.cpp JSON output")?;

    Ok(output
        .transcription
        .into_iter()
        .map(|segment| TranscriptSegment {
            start: segment.offsets.from as f64 / 1000.0,
            end: segment.offsets.to as f64 / 1000.0,
            text: segment.text,
        })
        .collect())
}

/// Parse the line-delimited JSON printed by the faster-whisper script
fn parse_segment_line(line: &str) -> Option<TranscriptSegment> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

const FASTER_WHISPER_SCRIPT: &str = r#"
import json
import sys
from faster_whisper import WhisperModel

media_file, model_name, beam_size, language = sys.argv[1], sys.argv[2], int(sys.argv[3]), sys.argv[4]

model = WhisperModel(model_name, device="cpu", compute_type="int8")
segments, info = model.transcribe(media_file, beam_size=beam_size, language=language or None)

for segment in segments:
    print(json.dumps({"start": segment.start, "end": segment.end, "text": segment.text}), flush=True)
"#;

/// Check if faster-whisper Python package is available
pub fn check_faster_whisper_available() -> bool {
    ["python", "python3"].iter().any(|python| {
        Command::new(python)
            .args(["-c", "import faster_whisper"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Check if Python is available
pub fn check_python_available() -> bool {
    ["python", "python3"].iter().any(|python| {
        Command::new(python)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Get the Python executable that works
fn get_python_executable() -> &'static str {
    if Command::new("python").arg("--version").output().is_ok() {
        "python"
    } else {
        "python3"
    }
}

/// Install faster-whisper if not available
pub fn install_faster_whisper() -> Result<()> {
    info!("Installing faster-whisper...");
    let python = get_python_executable();

    let status = Command::new(python)
        .args(["-m", "pip", "install", "faster-whisper"])
        .status()
        .context("Failed to run pip")?;

    if status.success() {
        info!("faster-whisper installed successfully");
        Ok(())
    } else {
        Err(anyhow!("Failed to install faster-whisper"))
    }
}

/// Whisper-based transcriber using the configured backend
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    pub config: TranscriptionConfig,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }

    fn transcribe_whisper_cpp(&self, media_file: &Path) -> Result<Vec<TranscriptSegment>> {
        let binary = get_whisper_cpp_binary()
            .ok_or_else(|| anyhow!("whisper.cpp binary not found. Please install it."))?;

        let model_path = if check_whisper_model_exists(self.config.model) {
            get_whisper_cpp_models_dir().join(self.config.model.ggml_filename())
        } else {
            info!("Model not found. Downloading...");
            download_whisper_model(self.config.model)?
        };

        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let audio_file = scratch.path().join("audio.wav");
        let output_base = scratch.path().join("transcript");

        info!("Extracting audio...");
        extract_audio(media_file, &audio_file)?;

        info!(
            "Transcribing with whisper.cpp ({}, beam size {})...",
            self.config.model, self.config.beam_size
        );

        let language = self.config.language.as_deref().unwrap_or("auto");
        let output = Command::new(&binary)
            .arg("-m")
            .arg(&model_path)
            .arg("-f")
            .arg(&audio_file)
            .args(["-l", language])
            .args(["-bs", &self.config.beam_size.to_string()])
            .args(["--output-json"])
            .arg("-of")
            .arg(&output_base)
            .output()
            .context("Failed to run whisper.cpp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("whisper.cpp failed: {}", stderr.trim()));
        }

        let json_file = output_base.with_extension("json");
        let content = fs::read_to_string(&json_file)
            .with_context(|| format!("whisper.cpp did not write {}", json_file.display()))?;
        parse_whisper_json(&content)
    }

    fn transcribe_faster_whisper(&self, media_file: &Path) -> Result<Vec<TranscriptSegment>> {
        if !check_faster_whisper_available() {
            info!("faster-whisper not found. Installing...");
            install_faster_whisper()?;
        }

        info!(
            "Transcribing with faster-whisper ({}, beam size {})...",
            self.config.model, self.config.beam_size
        );

        let mut child = Command::new(get_python_executable())
            .args(["-c", FASTER_WHISPER_SCRIPT])
            .arg(media_file)
            .arg(self.config.model.to_string())
            .arg(self.config.beam_size.to_string())
            .arg(self.config.language.as_deref().unwrap_or(""))
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to start faster-whisper")?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("faster-whisper stdout unavailable"))?;

        // Segments are printed as they are decoded
        let mut segments = Vec::new();
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            match parse_segment_line(&line) {
                Some(segment) => {
                    debug!(
                        "[{:.2}s -> {:.2}s] {}",
                        segment.start,
                        segment.end,
                        segment.text.trim()
                    );
                    segments.push(segment);
                }
                None => debug!("faster-whisper: {}", line),
            }
        }

        let status = child.wait()?;
        if status.success() {
            Ok(segments)
        } else {
            Err(anyhow!("faster-whisper failed ({})", status))
        }
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, media_file: &Path) -> Result<Vec<TranscriptSegment>> {
        if !media_file.exists() {
            return Err(anyhow!("Media file not found: {}", media_file.display()));
        }

        match self.config.backend {
            TranscriptionBackend::WhisperCpp => self.transcribe_whisper_cpp(media_file),
            TranscriptionBackend::FasterWhisper => self.transcribe_faster_whisper(media_file),
        }
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::from_millis((seconds.max(0.0) * 1000.0).round() as u64)
}

/// Map transcript segments to cues with contiguous 1-based indices.
///
/// Segments with blank text or a non-positive length are skipped.
pub fn transcript_to_cues<I>(segments: I) -> Vec<Cue>
where
    I: IntoIterator<Item = TranscriptSegment>,
{
    let mut cues = Vec::new();
    for segment in segments {
        let cue = Cue::new(
            cues.len() + 1,
            seconds_to_duration(segment.start),
            seconds_to_duration(segment.end),
            segment.text.trim(),
        );
        if cue.is_well_formed() {
            cues.push(cue);
        } else {
            warn!(
                "Skipping malformed segment [{:.3}s -> {:.3}s] '{}'",
                segment.start,
                segment.end,
                segment.text.trim()
            );
        }
    }
    cues
}

/// Transcribe the whole source once and turn the segments into cues
pub fn generate_subtitles_voice<T>(transcriber: &T, media_file: &Path) -> Result<Vec<Cue>>
where
    T: Transcriber + ?Sized,
{
    let segments = transcriber.transcribe(media_file)?;
    info!("Transcription returned {} segment(s)", segments.len());
    Ok(transcript_to_cues(segments))
}

/// Print transcription backend status
pub fn print_transcription_status() {
    println!("\n=== Transcription Backend Status ===");

    if let Some(binary) = get_whisper_cpp_binary() {
        println!("  [OK] whisper.cpp: Available");
        println!("       Binary: {}", binary);
    } else {
        println!("  [--] whisper.cpp: Not found");
        println!("       Download from: https://github.com/ggerganov/whisper.cpp/releases");
    }

    if check_python_available() {
        if check_faster_whisper_available() {
            println!("  [OK] faster-whisper: Available");
        } else {
            println!("  [--] faster-whisper: Not installed (run: pip install faster-whisper)");
        }
    } else {
        println!("  [--] Python: Not found");
    }

    println!();
}

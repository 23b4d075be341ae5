use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use tracing::info;

pub mod burn;
pub mod consolidate;
pub mod cue;
pub mod ocr;
pub mod region;
pub mod review;
pub mod srt;
pub mod transcribe;
pub mod translate;

pub use cue::{Cue, Sample};
pub use region::SubtitleRegion;
pub use review::{Prompter, ReviewDecision, StdioPrompter};
pub use transcribe::{TranscriptionConfig, WhisperModel};
pub use translate::{LanguagePair, TranslatorBackend};

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 500;
pub const DEFAULT_LIBRETRANSLATE_URL: &str = "http://localhost:5000";

/// Where subtitle text comes from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Read burned-in text from sampled frames
    Ocr,
    /// Transcribe the audio track
    #[default]
    Voice,
}

/// Translation settings
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub pair: LanguagePair,
    pub backend: TranslatorBackend,
    pub libretranslate_url: String,
    pub libretranslate_api_key: Option<String>,
    /// Offer every translated cue for manual correction
    pub manual_verification: bool,
}

impl TranslationConfig {
    pub fn new(pair: LanguagePair) -> Self {
        Self {
            pair,
            backend: TranslatorBackend::Argos,
            libretranslate_url: DEFAULT_LIBRETRANSLATE_URL.to_string(),
            libretranslate_api_key: None,
            manual_verification: false,
        }
    }

    /// Build the translator for the configured backend
    pub fn translator(&self) -> Result<Box<dyn translate::Translator>> {
        Ok(match self.backend {
            TranslatorBackend::Argos => Box::new(translate::ArgosTranslator),
            TranslatorBackend::LibreTranslate => Box::new(translate::LibreTranslateClient::new(
                &self.libretranslate_url,
                self.libretranslate_api_key.as_deref(),
            )?),
        })
    }
}

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: SourceMode,
    pub video_path: PathBuf,
    pub output_srt: PathBuf,
    /// Burn subtitles into this file when set
    pub output_video: Option<PathBuf>,
    pub overwrite: bool,
    pub frame_interval_ms: u64,
    pub region: SubtitleRegion,
    pub ocr_language: String,
    pub transcription: TranscriptionConfig,
    pub translation: Option<TranslationConfig>,
    /// Ask for confirmation of every cue before writing anything
    pub verify_subtitles: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Voice,
            video_path: PathBuf::from("video.mp4"),
            output_srt: PathBuf::from("subtitles.srt"),
            output_video: None,
            overwrite: false,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            region: SubtitleRegion::Bottom,
            ocr_language: "eng".to_string(),
            transcription: TranscriptionConfig::default(),
            translation: None,
            verify_subtitles: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            return Err(anyhow!("Frame interval must be greater than zero"));
        }
        if !self.video_path.exists() {
            return Err(anyhow!("Video file not found: {}", self.video_path.display()));
        }
        Ok(())
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        cue_count: usize,
        srt_path: PathBuf,
        video_path: Option<PathBuf>,
    },
    /// The reviewer rejected a cue; nothing was written
    Cancelled { index: usize },
}

/// Produce cues with the configured source
pub fn generate_cues(config: &PipelineConfig) -> Result<Vec<Cue>> {
    match config.mode {
        SourceMode::Ocr => ocr::scan_video(
            &config.video_path,
            config.region,
            &config.ocr_language,
            config.frame_interval_ms,
        ),
        SourceMode::Voice => {
            let transcriber = transcribe::WhisperTranscriber::new(config.transcription.clone());
            transcribe::generate_subtitles_voice(&transcriber, &config.video_path)
        }
    }
}

/// Everything after cue production: translate, review, write, burn
pub fn finish_cues(
    cues: Vec<Cue>,
    config: &PipelineConfig,
    translator: Option<&dyn translate::Translator>,
    prompter: &mut dyn Prompter,
) -> Result<RunOutcome> {
    let cues = match (&config.translation, translator) {
        (Some(translation), Some(translator)) => {
            let editor = if translation.manual_verification {
                Some(&mut *prompter)
            } else {
                None
            };
            translate::translate_cues(cues, translator, &translation.pair, editor)?
        }
        (Some(_), None) => return Err(anyhow!("Translation requested but no translator given")),
        (None, _) => cues,
    };

    if config.verify_subtitles {
        if let ReviewDecision::Rejected { index } = review::review_cues(&cues, prompter)? {
            info!("Subtitles not confirmed (cue {}). Nothing written.", index);
            return Ok(RunOutcome::Cancelled { index });
        }
    }

    srt::write_srt(&cues, &config.output_srt)?;
    info!(
        "{} subtitle(s) saved to {}",
        cues.len(),
        config.output_srt.display()
    );

    if let Some(output_video) = &config.output_video {
        burn::burn_subtitles(
            &config.video_path,
            &config.output_srt,
            output_video,
            config.overwrite,
        )?;
        info!("Video with subtitles saved to {}", output_video.display());
    }

    Ok(RunOutcome::Completed {
        cue_count: cues.len(),
        srt_path: config.output_srt.clone(),
        video_path: config.output_video.clone(),
    })
}

/// Run the whole pipeline: produce, translate, review, write, burn
pub fn run_pipeline(config: &PipelineConfig, prompter: &mut dyn Prompter) -> Result<RunOutcome> {
    config.validate()?;

    // Fail on a missing language pair before any expensive work
    let translator = match &config.translation {
        Some(translation) => {
            let translator = translation.translator()?;
            translator.ensure_available(&translation.pair)?;
            Some(translator)
        }
        None => None,
    };

    info!("Generating subtitles ({})...", config.mode);
    let cues = generate_cues(config)?;
    if cues.is_empty() {
        info!("No subtitles found in {}", config.video_path.display());
    }

    finish_cues(cues, config, translator.as_deref(), prompter)
}

/// Check the external tools the configured run needs
pub fn check_dependencies(config: &PipelineConfig) -> Result<()> {
    let mut missing = Vec::new();

    let needs_ffmpeg = match config.mode {
        SourceMode::Ocr => true,
        SourceMode::Voice => {
            config.transcription.backend == transcribe::TranscriptionBackend::WhisperCpp
        }
    } || config.output_video.is_some();
    if needs_ffmpeg && which::which("ffmpeg").is_err() {
        missing.push("FFmpeg not found. Please install FFmpeg and ensure it is in PATH.".to_string());
    }

    match config.mode {
        SourceMode::Ocr => {
            if which::which("ffprobe").is_err() {
                missing.push(
                    "ffprobe not found. It ships with FFmpeg; ensure it is in PATH.".to_string(),
                );
            }
            if which::which("tesseract").is_err() {
                missing.push(
                    "tesseract not found. Please install Tesseract OCR and ensure it is in PATH."
                        .to_string(),
                );
            }
        }
        SourceMode::Voice => match config.transcription.backend {
            transcribe::TranscriptionBackend::WhisperCpp => {
                if !transcribe::check_whisper_cpp_available() {
                    missing.push("whisper.cpp not found.\nDownload: https://github.com/ggerganov/whisper.cpp/releases".to_string());
                }
            }
            transcribe::TranscriptionBackend::FasterWhisper => {
                if !transcribe::check_python_available() {
                    missing.push("Python not found (needed for faster-whisper).".to_string());
                }
            }
        },
    }

    if let Some(translation) = &config.translation {
        if translation.backend == TranslatorBackend::Argos {
            for tool in ["argos-translate", "argospm"] {
                if which::which(tool).is_err() {
                    missing.push(format!(
                        "{} not found. Install it with: pip install argostranslate",
                        tool
                    ));
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(missing.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::tests::ScriptedPrompter;
    use crate::translate::Translator;
    use std::path::Path;
    use std::time::Duration;

    struct UppercaseTranslator;

    impl Translator for UppercaseTranslator {
        fn ensure_available(&self, _pair: &LanguagePair) -> Result<()> {
            Ok(())
        }

        fn translate(&self, text: &str, _pair: &LanguagePair) -> Result<String> {
            Ok(text.to_uppercase())
        }
    }

    fn cues() -> Vec<Cue> {
        vec![
            Cue::new(1, Duration::from_millis(0), Duration::from_millis(1500), "Hello World"),
            Cue::new(2, Duration::from_millis(1500), Duration::from_millis(2000), "Bye Now"),
        ]
    }

    fn config_in(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            output_srt: dir.join("subtitles.srt"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_source_mode_parsing() {
        assert_eq!("ocr".parse::<SourceMode>().ok(), Some(SourceMode::Ocr));
        assert_eq!(SourceMode::Voice.to_string(), "voice");
        assert_eq!(SourceMode::default(), SourceMode::Voice);
    }

    #[test]
    fn test_finish_writes_srt() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut prompter = ScriptedPrompter::new(&[]);

        let outcome = finish_cues(cues(), &config, None, &mut prompter).unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                cue_count: 2,
                srt_path: config.output_srt.clone(),
                video_path: None,
            }
        );
        assert_eq!(srt::read_srt(&config.output_srt).unwrap(), cues());
    }

    #[test]
    fn test_rejected_review_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            verify_subtitles: true,
            ..config_in(dir.path())
        };
        let mut prompter = ScriptedPrompter::new(&["", "n"]);

        let outcome = finish_cues(cues(), &config, None, &mut prompter).unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled { index: 2 });
        assert!(!config.output_srt.exists());
    }

    #[test]
    fn test_translate_then_review() {
        let dir = tempfile::tempdir().unwrap();
        let mut translation = TranslationConfig::new(LanguagePair::new("en", "pt").unwrap());
        translation.manual_verification = true;
        let config = PipelineConfig {
            verify_subtitles: true,
            translation: Some(translation),
            ..config_in(dir.path())
        };
        // Two edit prompts (keep, override), then two confirmations
        let mut prompter = ScriptedPrompter::new(&["", "Tchau", "", ""]);

        let outcome =
            finish_cues(cues(), &config, Some(&UppercaseTranslator), &mut prompter).unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { cue_count: 2, .. }));
        let written = srt::read_srt(&config.output_srt).unwrap();
        assert_eq!(written[0].content, "HELLO WORLD");
        assert_eq!(written[1].content, "Tchau");
        assert_eq!(written[1].start, Duration::from_millis(1500));
    }

    #[test]
    fn test_translation_without_translator_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            translation: Some(TranslationConfig::new(LanguagePair::new("en", "pt").unwrap())),
            ..config_in(dir.path())
        };
        let mut prompter = ScriptedPrompter::new(&[]);
        assert!(finish_cues(cues(), &config, None, &mut prompter).is_err());
        assert!(!config.output_srt.exists());
    }

    #[test]
    fn test_embedding_failure_keeps_srt() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("out.mp4");
        std::fs::write(&existing, b"already here").unwrap();
        let config = PipelineConfig {
            output_video: Some(existing),
            overwrite: false,
            ..config_in(dir.path())
        };
        let mut prompter = ScriptedPrompter::new(&[]);

        assert!(finish_cues(cues(), &config, None, &mut prompter).is_err());
        assert!(config.output_srt.exists());
    }

    #[test]
    fn test_validate() {
        let config = PipelineConfig {
            video_path: PathBuf::from("/nonexistent/video.mp4"),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video.mp4");
        std::fs::write(&video, b"").unwrap();
        let config = PipelineConfig {
            video_path: video,
            frame_interval_ms: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

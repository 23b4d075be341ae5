use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use vidsub::transcribe::{print_transcription_status, TranscriptionBackend};
use vidsub::{
    check_dependencies, run_pipeline, LanguagePair, PipelineConfig, RunOutcome, SourceMode,
    StdioPrompter, SubtitleRegion, TranscriptionConfig, TranslationConfig, TranslatorBackend,
    WhisperModel, DEFAULT_FRAME_INTERVAL_MS, DEFAULT_LIBRETRANSLATE_URL,
};

#[derive(Parser, Debug)]
#[command(version, about = "Generate, translate and burn subtitles for a video", long_about = None)]
struct Args {
    /// Where subtitle text comes from: ocr (on-screen text) or voice (speech)
    #[arg(long, default_value_t = SourceMode::Voice)]
    mode: SourceMode,

    /// Video to subtitle
    #[arg(long, default_value = "video.mp4")]
    video_path: PathBuf,

    /// Where to write the SRT file
    #[arg(long, default_value = "subtitles.srt")]
    output_srt: PathBuf,

    /// Burn the subtitles into this video file
    #[arg(long)]
    output_video: Option<PathBuf>,

    /// Replace the output video if it exists
    #[arg(long)]
    overwrite: bool,

    /// Milliseconds between sampled frames (ocr mode)
    #[arg(long, default_value_t = DEFAULT_FRAME_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    frame_interval: u64,

    /// Part of the frame holding the text: bottom, top or full (ocr mode)
    #[arg(long, default_value_t = SubtitleRegion::Bottom)]
    region: SubtitleRegion,

    /// Tesseract language (ocr mode)
    #[arg(long, default_value = "eng")]
    ocr_lang: String,

    /// Whisper model size: tiny, base, small, medium, large (voice mode)
    #[arg(long, default_value_t = WhisperModel::Small)]
    model: WhisperModel,

    /// Beam search width (voice mode)
    #[arg(long, default_value_t = 5)]
    beam_size: u32,

    /// Spoken language, detected when omitted (voice mode)
    #[arg(long)]
    language: Option<String>,

    /// Force a transcription backend: whisper-cpp or faster-whisper
    #[arg(long)]
    backend: Option<TranscriptionBackend>,

    /// Translate the subtitles
    #[arg(long)]
    translate: bool,

    /// Language of the subtitles before translation
    #[arg(long, default_value = "en")]
    from_lang: String,

    /// Language to translate into
    #[arg(long, default_value = "pt")]
    to_lang: String,

    /// Translate with a pair such as en:pt or en->pt (implies --translate)
    #[arg(long)]
    language_pair: Option<LanguagePair>,

    /// Translation engine: argos or libretranslate
    #[arg(long, default_value_t = TranslatorBackend::Argos)]
    translator: TranslatorBackend,

    /// LibreTranslate server URL
    #[arg(long, default_value = DEFAULT_LIBRETRANSLATE_URL)]
    libretranslate_url: String,

    /// LibreTranslate API key
    #[arg(long)]
    libretranslate_api_key: Option<String>,

    /// Review and edit each translation by hand
    #[arg(long)]
    manual_verification: bool,

    /// Confirm every subtitle before anything is written
    #[arg(long)]
    verify_subtitles: bool,

    /// Show transcription backend status and exit
    #[arg(long)]
    status: bool,

    /// Debug logging (prints every OCR sample)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut transcription =
            TranscriptionConfig::new(self.model, self.beam_size, self.language.as_deref());
        if let Some(backend) = self.backend {
            transcription = transcription.with_backend(backend);
        }

        let translation = if self.translate || self.language_pair.is_some() {
            let pair = match self.language_pair {
                Some(pair) => pair,
                None => LanguagePair::new(&self.from_lang, &self.to_lang)?,
            };
            let mut translation = TranslationConfig::new(pair);
            translation.backend = self.translator;
            translation.libretranslate_url = self.libretranslate_url;
            translation.libretranslate_api_key = self.libretranslate_api_key;
            translation.manual_verification = self.manual_verification;
            Some(translation)
        } else {
            None
        };

        Ok(PipelineConfig {
            mode: self.mode,
            video_path: self.video_path,
            output_srt: self.output_srt,
            output_video: self.output_video,
            overwrite: self.overwrite,
            frame_interval_ms: self.frame_interval,
            region: self.region,
            ocr_language: self.ocr_lang,
            transcription,
            translation,
            verify_subtitles: self.verify_subtitles,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if args.status {
        print_transcription_status();
        return Ok(());
    }

    let config = args.into_config()?;

    info!("Mode: {}", config.mode);
    info!("Video path: {}", config.video_path.display());
    info!("Output SRT path: {}", config.output_srt.display());
    match &config.output_video {
        Some(path) => info!("Output video path: {}", path.display()),
        None => info!("Output video: not requested"),
    }
    match config.mode {
        SourceMode::Ocr => info!(
            "Frame interval: {} ms, region: {}",
            config.frame_interval_ms, config.region
        ),
        SourceMode::Voice => info!(
            "Whisper model: {} (beam size {}, backend {})",
            config.transcription.model,
            config.transcription.beam_size,
            config.transcription.backend
        ),
    }
    if let Some(translation) = &config.translation {
        info!(
            "Translate: {} via {} (manual verification: {})",
            translation.pair, translation.backend, translation.manual_verification
        );
    }
    info!("Verify subtitles: {}", config.verify_subtitles);

    // Check external tools (ffmpeg, tesseract, whisper, argos)
    if let Err(e) = check_dependencies(&config) {
        error!("Error checking dependencies:\n{}", e);
        std::process::exit(1);
    }

    let mut prompter = StdioPrompter;
    match run_pipeline(&config, &mut prompter)? {
        RunOutcome::Completed {
            cue_count,
            srt_path,
            video_path,
        } => {
            println!(
                "Finished. {} subtitle(s) saved to '{}'.",
                cue_count,
                srt_path.display()
            );
            if let Some(video_path) = video_path {
                println!("Video with subtitles saved to '{}'.", video_path.display());
            }
            Ok(())
        }
        RunOutcome::Cancelled { index } => {
            error!("Subtitles not confirmed (rejected at cue {}). Exiting.", index);
            std::process::exit(1);
        }
    }
}

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Escape a path for use inside an FFmpeg filter argument
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Build the FFmpeg arguments that hard-render `srt_file` into `video_file`
pub fn burn_args(video_file: &Path, srt_file: &Path, output_file: &Path, overwrite: bool) -> Vec<String> {
    let abs_sub_path = srt_file
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(srt_file));

    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video_file.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("subtitles='{}'", escape_filter_path(&abs_sub_path)),
        "-c:a".to_string(),
        "copy".to_string(),
        // Without -y FFmpeg would stop and ask; -n makes it fail instead
        if overwrite { "-y" } else { "-n" }.to_string(),
        output_file.to_string_lossy().to_string(),
    ]
}

/// Burn subtitle onto video using FFmpeg
pub fn burn_subtitles(
    video_file: &Path,
    srt_file: &Path,
    output_file: &Path,
    overwrite: bool,
) -> Result<()> {
    if !overwrite && output_file.exists() {
        return Err(anyhow!(
            "Output video {} already exists (use --overwrite to replace it)",
            output_file.display()
        ));
    }

    info!("Burning subtitles into {}...", output_file.display());

    let output = Command::new("ffmpeg")
        .args(burn_args(video_file, srt_file, output_file, overwrite))
        .output()
        .context("Failed to run ffmpeg")?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow!("Failed to burn subtitle to video: {}", stderr.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burn_args_overwrite_flag() {
        let args = burn_args(
            Path::new("in.mp4"),
            Path::new("/tmp/does-not-exist/subs.srt"),
            Path::new("out.mp4"),
            true,
        );
        assert_eq!(args[4], "in.mp4");
        assert_eq!(args[6], "subtitles='/tmp/does-not-exist/subs.srt'");
        assert_eq!(args[args.len() - 2], "-y");
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));

        let args = burn_args(Path::new("in.mp4"), Path::new("subs.srt"), Path::new("out.mp4"), false);
        assert_eq!(args[args.len() - 2], "-n");
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\videos\\it's.srt")),
            "C\\:/videos/it\\'s.srt"
        );
    }

    #[test]
    fn test_existing_output_without_overwrite_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        std::fs::write(&output, b"existing").unwrap();

        let err = burn_subtitles(Path::new("in.mp4"), Path::new("subs.srt"), &output, false)
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}

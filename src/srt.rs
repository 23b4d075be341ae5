//! SubRip (`.srt`) reading and writing.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::cue::Cue;

fn timing_regex() -> &'static Regex {
    static TIMING: OnceLock<Regex> = OnceLock::new();
    TIMING.get_or_init(|| {
        Regex::new(r"^\s*(\d+:\d{2}:\d{2}[,.]\d{1,3})\s*-->\s*(\d+:\d{2}:\d{2}[,.]\d{1,3})")
            .expect("timing regex is valid")
    })
}

/// Format time for SRT format (HH:MM:SS,mmm)
pub fn format_timestamp(time: Duration) -> String {
    let total_ms = time.as_millis();
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Parse "00:00:01,234" (a dot is accepted in place of the comma)
pub fn parse_timestamp(s: &str) -> Option<Duration> {
    let s = s.trim().replace('.', ",");
    let (hms, millis) = s.split_once(',')?;
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let h: u64 = parts[0].parse().ok()?;
    let m: u64 = parts[1].parse().ok()?;
    let s: u64 = parts[2].parse().ok()?;
    if m >= 60 || s >= 60 || millis.is_empty() || millis.len() > 3 {
        return None;
    }
    // "1,5" means 500 ms
    let ms: u64 = format!("{:0<3}", millis).parse().ok()?;
    Some(Duration::from_millis(((h * 60 + m) * 60 + s) * 1000 + ms))
}

/// Parse a timing line "00:00:01,000 --> 00:00:02,500"
fn parse_timing_line(line: &str) -> Option<(Duration, Duration)> {
    let caps = timing_regex().captures(line)?;
    Some((parse_timestamp(&caps[1])?, parse_timestamp(&caps[2])?))
}

/// Render cues as SRT text, in ascending index order
pub fn compose(cues: &[Cue]) -> String {
    let mut ordered: Vec<&Cue> = cues.iter().collect();
    ordered.sort_by_key(|cue| cue.index);

    let mut out = String::new();
    for cue in ordered {
        out.push_str(&format!(
            "{}\n{} --> {}\n",
            cue.index,
            format_timestamp(cue.start),
            format_timestamp(cue.end)
        ));
        // A blank line would end the entry early
        for line in cue.content.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Parse SRT text into cues
pub fn parse(content: &str) -> Result<Vec<Cue>> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut lines = content.lines().enumerate().peekable();

    while let Some((line_no, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let index: usize = line
            .parse()
            .map_err(|_| anyhow!("line {}: expected cue index, found '{}'", line_no + 1, line))?;

        let (timing_no, timing) = lines
            .next()
            .ok_or_else(|| anyhow!("line {}: cue {} has no timing line", line_no + 1, index))?;
        let (start, end) = parse_timing_line(timing)
            .ok_or_else(|| anyhow!("line {}: invalid timing '{}'", timing_no + 1, timing.trim()))?;

        // Collect text lines until empty line
        let mut text_parts = Vec::new();
        while let Some((_, text_line)) = lines.peek() {
            if text_line.trim().is_empty() {
                break;
            }
            text_parts.push(text_line.trim_end().to_string());
            lines.next();
        }

        let cue = Cue::new(index, start, end, text_parts.join("\n"));
        if index == 0 {
            return Err(anyhow!("line {}: cue index must start at 1", line_no + 1));
        }
        if start >= end {
            return Err(anyhow!(
                "line {}: cue {} must end after it starts",
                timing_no + 1,
                index
            ));
        }
        if !cue.is_well_formed() {
            return Err(anyhow!("line {}: cue {} has no text", timing_no + 2, index));
        }
        cues.push(cue);
    }

    Ok(cues)
}

/// Write cues to an SRT file
pub fn write_srt(cues: &[Cue], output_path: &Path) -> Result<()> {
    fs::write(output_path, compose(cues))
        .with_context(|| format!("Failed to write {}", output_path.display()))
}

/// Read cues from an SRT file
pub fn read_srt(path: &Path) -> Result<Vec<Cue>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content)
}

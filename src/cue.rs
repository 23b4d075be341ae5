use std::time::Duration;

/// Minimum number of characters (exclusive) a recognized line needs to count as a subtitle
pub const MIN_TEXT_CHARS: usize = 4;

/// One timed subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 1-based position in the output file
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub content: String,
}

impl Cue {
    pub fn new(index: usize, start: Duration, end: Duration, content: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            content: content.into(),
        }
    }

    /// A cue can be written out only when it has a positive length and visible text
    pub fn is_well_formed(&self) -> bool {
        self.index >= 1 && self.start < self.end && !self.content.trim().is_empty()
    }
}

/// A timestamped text observation taken during a periodic frame scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Milliseconds from the start of the video
    pub timestamp_ms: u64,
    pub text: String,
}

impl Sample {
    pub fn new(timestamp_ms: u64, text: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            text: text.into(),
        }
    }
}

/// Decide whether recognized text is a real subtitle line or recognition noise.
///
/// Text counts when, after trimming, it is longer than [`MIN_TEXT_CHARS`]
/// characters and contains at least one alphabetic character.
pub fn is_valid_text(text: &str) -> bool {
    let text = text.trim();
    text.chars().count() > MIN_TEXT_CHARS && text.chars().any(char::is_alphabetic)
}

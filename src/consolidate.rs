//! Turns a periodic stream of recognized text into discrete subtitle cues.
//!
//! Consecutive samples with the same valid text are merged into one cue. A cue
//! closes only when different valid text appears or the scan ends; samples
//! with invalid text (empty, too short, no letters) leave the open cue as is.

use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::cue::{is_valid_text, Cue, Sample};

/// Forward-scan state of the consolidation.
#[derive(Debug, Clone)]
pub struct Consolidator {
    frame_interval_ms: u64,
    last_text: String,
    pending_start: Option<u64>,
    next_index: usize,
    /// Where the scan currently stands: one interval after the last sample
    cursor_ms: u64,
}

impl Consolidator {
    /// A zero interval is rejected: the last cue would end where it starts.
    pub fn new(frame_interval_ms: u64) -> Result<Self> {
        if frame_interval_ms == 0 {
            return Err(anyhow!("Frame interval must be greater than zero"));
        }
        Ok(Self {
            frame_interval_ms,
            last_text: String::new(),
            pending_start: None,
            next_index: 1,
            cursor_ms: 0,
        })
    }

    /// Feed one sample. Returns the previous cue when this sample closes it.
    ///
    /// Samples must arrive in strictly increasing timestamp order.
    pub fn push(&mut self, sample: Sample) -> Option<Cue> {
        let timestamp = sample.timestamp_ms;
        self.cursor_ms = timestamp.saturating_add(self.frame_interval_ms);

        let text = sample.text.trim();
        if !is_valid_text(text) || text == self.last_text {
            return None;
        }

        let closed = match self.pending_start {
            Some(start) if !self.last_text.is_empty() => Some(self.close(start, timestamp)),
            _ => None,
        };

        self.pending_start = Some(timestamp);
        self.last_text = text.to_string();
        closed
    }

    /// End the scan, flushing the open cue with its end at the point the scan stopped.
    pub fn finish(mut self) -> Option<Cue> {
        match self.pending_start {
            Some(start) if is_valid_text(&self.last_text) => Some(self.close(start, self.cursor_ms)),
            _ => None,
        }
    }

    /// Timestamp one interval past the last sample seen
    pub fn cursor_ms(&self) -> u64 {
        self.cursor_ms
    }

    fn close(&mut self, start_ms: u64, end_ms: u64) -> Cue {
        let cue = Cue::new(
            self.next_index,
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
            self.last_text.clone(),
        );
        self.next_index += 1;
        cue
    }
}

/// Consolidate a whole sample sequence taken every `frame_interval_ms` milliseconds.
pub fn consolidate<I>(samples: I, frame_interval_ms: u64) -> Result<Vec<Cue>>
where
    I: IntoIterator<Item = Sample>,
{
    let mut consolidator = Consolidator::new(frame_interval_ms)?;
    let mut cues: Vec<Cue> = samples
        .into_iter()
        .filter_map(|sample| consolidator.push(sample))
        .collect();
    cues.extend(consolidator.finish());
    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(items: &[(u64, &str)]) -> Vec<Sample> {
        items.iter().map(|(ts, text)| Sample::new(*ts, *text)).collect()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_merges_identical_runs() {
        let cues = consolidate(
            samples(&[(0, "AAAAA"), (500, "AAAAA"), (1000, "AAAAA"), (1500, "BBBBB")]),
            500,
        )
        .unwrap();
        assert_eq!(
            cues,
            vec![
                Cue::new(1, ms(0), ms(1500), "AAAAA"),
                Cue::new(2, ms(1500), ms(2000), "BBBBB"),
            ]
        );
    }

    #[test]
    fn test_invalid_text_does_not_split_run() {
        let cues = consolidate(
            samples(&[
                (0, "Hello World"),
                (500, "??"),
                (1000, "Hello World"),
                (1500, "Bye Now"),
            ]),
            500,
        )
        .unwrap();
        assert_eq!(
            cues,
            vec![
                Cue::new(1, ms(0), ms(1500), "Hello World"),
                Cue::new(2, ms(1500), ms(2000), "Bye Now"),
            ]
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(consolidate(samples(&[(0, "Hello World")]), 0).is_err());
        assert!(Consolidator::new(0).is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(consolidate(Vec::new(), 500).unwrap().is_empty());
    }

    #[test]
    fn test_only_invalid_samples() {
        let cues =
            consolidate(samples(&[(0, ""), (500, "hi"), (1000, "12"), (1500, "  ")]), 500).unwrap();
        assert!(cues.is_empty());
    }

    #[test]
    fn test_invalid_gap_keeps_cue_open_until_end() {
        let cues = consolidate(
            samples(&[(0, ""), (500, "First line"), (1000, ""), (1500, ""), (2000, "")]),
            500,
        )
        .unwrap();
        assert_eq!(cues, vec![Cue::new(1, ms(500), ms(2500), "First line")]);
    }

    #[test]
    fn test_text_is_trimmed_before_comparison() {
        let cues = consolidate(
            samples(&[(0, "Same text\n"), (250, "  Same text"), (500, "Other text")]),
            250,
        )
        .unwrap();
        assert_eq!(
            cues,
            vec![
                Cue::new(1, ms(0), ms(500), "Same text"),
                Cue::new(2, ms(500), ms(750), "Other text"),
            ]
        );
    }

    #[test]
    fn test_indices_contiguous_and_cues_abut() {
        let cues = consolidate(
            samples(&[
                (0, "noise"),
                (100, "?"),
                (200, "line one"),
                (300, "line one"),
                (400, ""),
                (500, "line two"),
                (600, "12345"),
                (700, "line one"),
                (800, "x"),
            ]),
            100,
        )
        .unwrap();

        let indices: Vec<usize> = cues.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert!(cues.iter().all(Cue::is_well_formed));
        for pair in cues.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(cues.last().map(|c| c.end), Some(ms(900)));
    }

    #[test]
    fn test_flicker_between_two_texts() {
        let cues = consolidate(
            samples(&[(0, "alpha one"), (500, "beta two"), (1000, "alpha one")]),
            500,
        )
        .unwrap();
        let contents: Vec<&str> = cues.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha one", "beta two", "alpha one"]);
        assert_eq!(cues[2].end, ms(1500));
    }

    #[test]
    fn test_push_reports_closed_cue() {
        let mut consolidator = Consolidator::new(500).unwrap();
        assert_eq!(consolidator.push(Sample::new(0, "Hello there")), None);
        assert_eq!(consolidator.push(Sample::new(500, "Hello there")), None);
        let closed = consolidator.push(Sample::new(1000, "General Kenobi"));
        assert_eq!(closed, Some(Cue::new(1, ms(0), ms(1000), "Hello there")));
        assert_eq!(consolidator.cursor_ms(), 1500);
        assert_eq!(
            consolidator.finish(),
            Some(Cue::new(2, ms(1000), ms(1500), "General Kenobi"))
        );
    }
}

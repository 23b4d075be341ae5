use anyhow::Result;
use std::io::{self, BufRead, Write};

use crate::cue::Cue;
use crate::srt::format_timestamp;

/// Synchronous question/answer channel with the person running the tool
pub trait Prompter {
    /// Print a line of information
    fn show(&mut self, text: &str) -> Result<()>;

    /// Print a question and wait for one line of input
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Prompter over the terminal's stdin/stdout
#[derive(Debug, Default)]
pub struct StdioPrompter;

impl Prompter for StdioPrompter {
    fn show(&mut self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        print!("{}", question);
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Result of the final review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Confirmed,
    /// The reviewer cancelled at this cue
    Rejected { index: usize },
}

fn is_rejection(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
}

/// Show every cue and ask for confirmation. Stops at the first rejection.
pub fn review_cues(cues: &[Cue], prompter: &mut dyn Prompter) -> Result<ReviewDecision> {
    prompter.show("\nReviewing final subtitles:")?;

    for (i, cue) in cues.iter().enumerate() {
        prompter.show(&format!(
            "\n[{}] {} --> {}",
            i + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end)
        ))?;
        prompter.show(&cue.content)?;

        let answer = prompter.ask("Confirm? (enter = yes / n = cancel): ")?;
        if is_rejection(&answer) {
            prompter.show("Cancelled by user.")?;
            return Ok(ReviewDecision::Rejected { index: cue.index });
        }
    }

    Ok(ReviewDecision::Confirmed)
}

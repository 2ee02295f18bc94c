//! Extraction of `[progress:N]` markers from generated text.
//!
//! The generator interleaves markers such as `[progress:40]` with the ebook
//! text.  Markers are not aligned to network chunks, so they have to be
//! searched for in the cumulative text rather than in each fragment alone.

use std::sync::LazyLock;

use regex::Regex;

/// Highest progress value.
pub const MAX_PROGRESS: u8 = 100;

static PROGRESS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[progress:(\d+)\]").expect("progress pattern should compile"));

/// Returns the value of the last `[progress:N]` marker in `text`, clamped to
/// `[0, 100]`, or `None` if there is no marker.
pub fn extract_progress(text: &str) -> Option<u8> {
    PROGRESS_MARKER
        .captures_iter(text)
        .last()
        .map(|captures| parse_value(&captures[1]))
}

fn parse_value(digits: &str) -> u8 {
    // Digits that overflow u64 are still "more than 100".
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    value.min(MAX_PROGRESS as u64) as u8
}

/// Current progress of one stream, updated from its cumulative text.
///
/// Rescanning the whole text on every fragment would be quadratic in the
/// length of the stream.  The tracker remembers where the last unfinished
/// `[` began and rescans from there, which finds every marker the full scan
/// would, including one split over several fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    value: u8,
    resume_at: usize,
}

impl ProgressTracker {
    /// A tracker at 0%.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current progress value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Scan the cumulative `text` of the stream and return the updated value.
    ///
    /// `text` must extend the text passed on the previous call.
    pub fn observe(&mut self, text: &str) -> u8 {
        let start = self.resume_at.min(text.len());
        let Some(tail) = text.get(start..) else {
            // Not a char boundary: the text was not an extension of the last.
            self.resume_at = 0;
            return self.observe(text);
        };
        if let Some(value) = extract_progress(tail) {
            self.value = value;
        }
        self.resume_at = start + unfinished_marker_start(tail).unwrap_or(tail.len());
        self.value
    }

    /// Back to 0% for a new stream.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// Offset of the last '[' that has no ']' after it.
fn unfinished_marker_start(text: &str) -> Option<usize> {
    let open = text.rfind('[')?;
    if text[open..].contains(']') {
        None
    } else {
        Some(open)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Presentation style of an ebook preview, also persisted as the ebook's style.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// One page at a time with previous/next navigation.
    #[default]
    Book,

    /// All paragraph blocks as a continuous list.
    Scroll,

    /// All pages as fixed aspect-ratio sheets.
    Pdf,
}

impl LayoutMode {
    /// All layout modes, in tab order.
    pub const ALL: [LayoutMode; 3] = [LayoutMode::Book, LayoutMode::Scroll, LayoutMode::Pdf];

    /// Human-readable tab label.
    pub fn label(&self) -> &'static str {
        match self {
            LayoutMode::Book => "Livre",
            LayoutMode::Scroll => "Défilement",
            LayoutMode::Pdf => "PDF Pro",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMode::Book => write!(f, "book"),
            LayoutMode::Scroll => write!(f, "scroll"),
            LayoutMode::Pdf => write!(f, "pdf"),
        }
    }
}

/// Error returned when parsing an invalid layout mode string.
#[derive(Debug)]
pub struct LayoutModeParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for LayoutModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown layout: {} (expected book, scroll, or pdf)",
            self.invalid_value
        )
    }
}

impl std::error::Error for LayoutModeParseError {}

impl FromStr for LayoutMode {
    type Err = LayoutModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "book" => Ok(LayoutMode::Book),
            "scroll" => Ok(LayoutMode::Scroll),
            "pdf" => Ok(LayoutMode::Pdf),
            _ => Err(LayoutModeParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

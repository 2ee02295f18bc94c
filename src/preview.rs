//! Layout selection for the ebook preview.
//!
//! [`render_preview`] is a pure function of the current pages, the current
//! text, and the layout mode.  The only navigation state, the page shown in
//! book mode, lives in a [`BookNavigator`] owned by the caller.

use crate::paginate::{Page, split_blocks};
use crate::types::LayoutMode;

/// Width-to-height ratio of a pdf sheet.
pub const SHEET_ASPECT_RATIO: (u16, u16) = (3, 4);

/// Current page of the book layout.
///
/// Moves are clamped to `[0, page_count - 1]`; there is no wraparound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookNavigator {
    index: usize,
}

impl BookNavigator {
    /// A navigator on the first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current page index, clamped to a pagination of `page_count` pages.
    pub fn index(&self, page_count: usize) -> usize {
        self.index.min(page_count.saturating_sub(1))
    }

    /// Move forward one page, stopping at the last.
    pub fn next(&mut self, page_count: usize) -> usize {
        self.index = (self.index(page_count) + 1).min(page_count.saturating_sub(1));
        self.index
    }

    /// Move back one page, stopping at the first.
    pub fn prev(&mut self, page_count: usize) -> usize {
        self.index = self.index(page_count).saturating_sub(1);
        self.index
    }

    /// Back to the first page, e.g. when switching documents.
    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// A fixed aspect-ratio sheet of the pdf layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    /// Index of the page on this sheet.
    pub index: usize,

    /// The page text.
    pub content: String,

    /// Width-to-height ratio.
    pub aspect_ratio: (u16, u16),
}

/// What the preview shows for one layout mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// A single page of the book layout.
    Book {
        /// The visible page.
        page: Page,
        /// Number of pages in the pagination.
        page_count: usize,
    },

    /// The raw text as a list of paragraph blocks.
    Scroll {
        /// Blocks in order.
        blocks: Vec<String>,
    },

    /// Every page as a sheet.
    Pdf {
        /// Sheets in page order.
        sheets: Vec<Sheet>,
    },
}

impl Preview {
    /// The layout this preview was rendered for.
    pub fn mode(&self) -> LayoutMode {
        match self {
            Preview::Book { .. } => LayoutMode::Book,
            Preview::Scroll { .. } => LayoutMode::Scroll,
            Preview::Pdf { .. } => LayoutMode::Pdf,
        }
    }
}

/// Build the preview of `text` and its `pages` for `mode`.
///
/// `pages` must be non-empty, as produced by the paginator.  Scroll mode
/// ignores `pages` and splits `text` itself.
pub fn render_preview(
    pages: &[Page],
    text: &str,
    mode: LayoutMode,
    navigator: &BookNavigator,
) -> Preview {
    match mode {
        LayoutMode::Book => {
            let index = navigator.index(pages.len());
            let page = pages.get(index).cloned().unwrap_or(Page {
                index: 0,
                content: String::new(),
            });
            Preview::Book {
                page,
                page_count: pages.len(),
            }
        }
        LayoutMode::Scroll => Preview::Scroll {
            blocks: split_blocks(text).into_iter().map(String::from).collect(),
        },
        LayoutMode::Pdf => Preview::Pdf {
            sheets: pages
                .iter()
                .map(|page| Sheet {
                    index: page.index,
                    content: page.content.clone(),
                    aspect_ratio: SHEET_ASPECT_RATIO,
                })
                .collect(),
        },
    }
}

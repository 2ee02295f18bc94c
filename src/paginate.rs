//! Grouping of generated text into preview pages.

use serde::{Deserialize, Serialize};

/// Separator between paragraph blocks.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Blocks per page unless configured otherwise.
pub const DEFAULT_BLOCKS_PER_PAGE: usize = 3;

/// Content of the single page produced for empty text.
pub const EMPTY_PAGE: &str = "Page vide";

/// One page of a preview.
///
/// Indices are positions in the current pagination only; they change
/// whenever the text is paginated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position of the page.
    pub index: usize,

    /// The page's paragraph blocks, rejoined by [`PARAGRAPH_BREAK`].
    pub content: String,
}

/// Splits text into pages of a fixed number of paragraph blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    blocks_per_page: usize,
}

impl Paginator {
    /// A paginator grouping `blocks_per_page` blocks per page (at least one).
    pub fn new(blocks_per_page: usize) -> Self {
        Self {
            blocks_per_page: blocks_per_page.max(1),
        }
    }

    /// The number of blocks grouped on each page.
    pub fn blocks_per_page(&self) -> usize {
        self.blocks_per_page
    }

    /// Paginate `text` from scratch.
    ///
    /// Always returns at least one page.  Empty or whitespace-only text gives
    /// the single page [`EMPTY_PAGE`].  Empty blocks between consecutive
    /// breaks are kept so that the pages rejoin to the original text.
    pub fn paginate(&self, text: &str) -> Vec<Page> {
        if text.trim().is_empty() {
            return vec![empty_page()];
        }
        let blocks = split_blocks(text);
        let pages: Vec<Page> = blocks
            .chunks(self.blocks_per_page)
            .enumerate()
            .map(|(index, group)| Page {
                index,
                content: group.join(PARAGRAPH_BREAK),
            })
            .collect();
        if pages.is_empty() {
            vec![empty_page()]
        } else {
            pages
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKS_PER_PAGE)
    }
}

/// Paginate with the default of three blocks per page.
pub fn paginate(text: &str) -> Vec<Page> {
    Paginator::default().paginate(text)
}

/// Split `text` into paragraph blocks.
pub fn split_blocks(text: &str) -> Vec<&str> {
    text.split(PARAGRAPH_BREAK).collect()
}

fn empty_page() -> Page {
    Page {
        index: 0,
        content: EMPTY_PAGE.to_string(),
    }
}

//! Terminal output for transcripts, previews, and the dashboard.
//!
//! The `format_*` functions build plain strings so they can be tested
//! without a terminal; [`PlainTextRenderer`] writes them, with optional ANSI
//! styling, as events arrive from a session.

use std::io::{self, Stdout, Write};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::dashboard::Dashboard;
use crate::paginate::Page;
use crate::preview::{Preview, Sheet};
use crate::types::{EbookStatus, Message, MessageRole};
use crate::utils::time::format_date;

/// ANSI escape code for dim text (used for rules and hints).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for headings).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for green text (used for the user and progress).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Inner width of a pdf sheet, in columns.
pub const SHEET_WIDTH: usize = 36;

/// Inner height of a pdf sheet.  Terminal cells are about twice as tall as
/// they are wide, so a 3:4 sheet is `width * 4 / 3 / 2` rows.
pub const SHEET_HEIGHT: usize = SHEET_WIDTH * 4 / 3 / 2;

/// Width of the progress bar, in columns.
const PROGRESS_BAR_WIDTH: usize = 20;

/// Receives the events of a chat session.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Called when the assistant placeholder is appended.
    fn start_response(&mut self);

    /// Print a streamed fragment of the assistant reply.
    fn print_text(&mut self, text: &str);

    /// Called when the reply is complete or has been replaced by an apology.
    fn finish_response(&mut self);

    /// Called when the extracted progress changes.
    fn print_progress(&mut self, progress: u8);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        // Output is best effort; a closed pipe must not abort the session.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    /// Print one transcript message.
    pub fn print_message(&mut self, message: &Message) {
        let label = match message.role {
            MessageRole::User => self.styled(ANSI_GREEN, "Vous:"),
            MessageRole::Assistant => self.styled(ANSI_BOLD, "Assistant:"),
        };
        self.write(&format!("{label} {}\n", message.content));
    }

    /// Print a whole transcript.
    pub fn print_transcript(&mut self, messages: &[Message]) {
        for message in messages {
            self.print_message(message);
        }
    }

    /// Print a preview.
    pub fn print_preview(&mut self, preview: &Preview) {
        let text = format_preview(preview);
        let text = if self.use_color {
            dim_rules(&text)
        } else {
            text
        };
        self.write(&text);
    }

    /// Print the dashboard table.
    pub fn print_dashboard(&mut self, dashboard: &Dashboard) {
        let text = format_dashboard(dashboard);
        self.write(&text);
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_response(&mut self) {
        let label = self.styled(ANSI_BOLD, "Assistant:");
        self.write(&format!("{label} "));
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_response(&mut self) {
        self.write("\n");
    }

    fn print_progress(&mut self, progress: u8) {
        let bar = self.styled(ANSI_GREEN, &format_progress_bar(progress));
        self.write(&format!("\n{bar}\n"));
    }

    fn print_error(&mut self, error: &str) {
        let label = self.styled(ANSI_RED, "Erreur:");
        let _ = writeln!(io::stderr(), "\n{label} {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.write(&format!("{info}\n"));
    }
}

fn dim_rules(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.starts_with('─') || line.starts_with('┌') || line.starts_with('└') {
                format!("{ANSI_DIM}{line}{ANSI_RESET}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// `[#####---------------]  25%`
pub fn format_progress_bar(progress: u8) -> String {
    let progress = progress.min(100) as usize;
    let filled = progress * PROGRESS_BAR_WIDTH / 100;
    format!(
        "[{}{}] {progress:>3}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

/// Format a preview for the terminal.
pub fn format_preview(preview: &Preview) -> String {
    match preview {
        Preview::Book { page, page_count } => format_book_page(page, *page_count),
        Preview::Scroll { blocks } => format_scroll(blocks),
        Preview::Pdf { sheets } => sheets.iter().map(format_sheet).collect(),
    }
}

fn format_book_page(page: &Page, page_count: usize) -> String {
    let position = format!("Page {} / {}", page.index + 1, page_count);
    format!(
        "──── {position} ────\n{}\n──── /prev  {position}  /next ────\n",
        page.content
    )
}

fn format_scroll(blocks: &[String]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push_str("────\n");
        }
        out.push_str(block);
        out.push('\n');
    }
    out
}

/// Draw a sheet as a fixed-size box; text beyond the last row is cut off.
///
/// Widths are terminal columns, so wide characters take two.
pub fn format_sheet(sheet: &Sheet) -> String {
    let mut lines = wrap(&sheet.content, SHEET_WIDTH);
    if lines.len() > SHEET_HEIGHT {
        lines.truncate(SHEET_HEIGHT);
        if let Some(last) = lines.last_mut() {
            *last = format!("{}…", clip(last, SHEET_WIDTH - 1));
        }
    }
    lines.resize(SHEET_HEIGHT, String::new());

    let title = format!(" {} ", sheet.index + 1);
    let mut out = format!(
        "┌{title}{}┐\n",
        "─".repeat(SHEET_WIDTH.saturating_sub(title.width()))
    );
    for line in lines {
        out.push_str(&format!("│{}│\n", pad(clip(&line, SHEET_WIDTH), SHEET_WIDTH)));
    }
    out.push_str(&format!("└{}┘\n", "─".repeat(SHEET_WIDTH)));
    out
}

/// Word-wrap `text` to `width` columns, keeping explicit line breaks.
/// Words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    textwrap::wrap(text, width.max(1))
        .into_iter()
        .map(|line| line.into_owned())
        .collect()
}

// The longest prefix of `text` that fits in `width` columns.
fn clip(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (i, ch) in text.char_indices() {
        used += ch.width().unwrap_or(0);
        if used > width {
            return &text[..i];
        }
    }
    text
}

// `text` followed by spaces up to `width` columns.
fn pad(text: &str, width: usize) -> String {
    format!("{text}{}", " ".repeat(width.saturating_sub(text.width())))
}

const STYLE_COLUMN: usize = 6;
const PROGRESS_COLUMN: usize = 27;
const SALES_COLUMN: usize = 6;
const DATE_COLUMN: usize = 11;

/// Format the dashboard as a table.
pub fn format_dashboard(dashboard: &Dashboard) -> String {
    let mut out = format!(
        "Ebooks: {} ({} publié(s), {} brouillon(s))\n",
        dashboard.ebook_count(),
        dashboard.count_with_status(EbookStatus::Published),
        dashboard.count_with_status(EbookStatus::Draft)
    );
    if dashboard.items().is_empty() {
        out.push_str("(aucun ebook)\n");
        return out;
    }
    let title_width = dashboard
        .items()
        .iter()
        .map(|item| item.title.width())
        .max()
        .unwrap_or(0)
        .max("Titre".width());
    let row = |title: &str, style: &str, progress: &str, sales: &str, date: &str, status: &str| {
        format!(
            "{}  {}  {}  {}  {}  {status}\n",
            pad(title, title_width),
            pad(style, STYLE_COLUMN),
            pad(progress, PROGRESS_COLUMN),
            pad(sales, SALES_COLUMN),
            pad(date, DATE_COLUMN),
        )
    };
    out.push_str(&row(
        "Titre",
        "Style",
        "Progression",
        "Ventes",
        "Mise à jour",
        "Statut",
    ));
    for item in dashboard.items() {
        let updated = item
            .updated_at
            .as_ref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&row(
            &item.title,
            &item.style.to_string(),
            &format_progress_bar(item.progress()),
            &item.sales().to_string(),
            &updated,
            &item.status().to_string(),
        ));
    }
    out
}

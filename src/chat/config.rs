//! Configuration types for the studio.
//!
//! [`StudioArgs`] is the command line, parsed with `arrrg`.  [`StudioConfig`]
//! is the resolved configuration: defaults, overridden by the environment,
//! overridden by an optional YAML file, overridden by the command line.
//! [`SessionConfig`] configures one chat surface.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::paginate::DEFAULT_BLOCKS_PER_PAGE;
use crate::types::{ChatMode, LayoutMode};

/// Environment variable holding the backend base URL.
pub const BACKEND_URL_ENV: &str = "EBOOK_STUDIO_BACKEND_URL";

/// Backend base URL when neither the environment nor the configuration set one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/";

/// Title given to generated ebooks until the user picks one.
pub const DEFAULT_TITLE: &str = "Mon Ebook IA";

/// First assistant message of the chat surface.
pub const GREETING: &str =
    "Bonjour! Je suis votre assistant IA. Comment puis-je vous aider aujourd'hui ?";

/// Command-line arguments for the ebook-studio tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct StudioArgs {
    /// Backend base URL.
    #[arrrg(
        optional,
        "Backend base URL (default: $EBOOK_STUDIO_BACKEND_URL or http://localhost:8000/)",
        "URL"
    )]
    pub base_url: Option<String>,

    /// Title used when saving generated ebooks.
    #[arrrg(optional, "Ebook title (default: Mon Ebook IA)", "TITLE")]
    pub title: Option<String>,

    /// Initial preview layout.
    #[arrrg(optional, "Preview layout: book, scroll, or pdf (default: book)", "LAYOUT")]
    pub layout: Option<String>,

    /// Paragraph blocks per preview page.
    #[arrrg(optional, "Paragraph blocks per page (default: 3)", "N")]
    pub blocks_per_page: Option<u32>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: none)", "SECS")]
    pub timeout_secs: Option<u32>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Transcript auto-save path for the chat surface.
    #[arrrg(optional, "Auto-save the chat transcript to FILE", "FILE")]
    pub transcript: Option<String>,

    /// Fail on malformed UTF-8 instead of substituting U+FFFD.
    #[arrrg(flag, "Fail on malformed UTF-8 in replies")]
    pub strict_utf8: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Contents of a YAML configuration file.  Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StudioFile {
    /// Backend base URL.
    pub base_url: Option<String>,
    /// Ebook title.
    pub title: Option<String>,
    /// Preview layout.
    pub layout: Option<LayoutMode>,
    /// Paragraph blocks per page.
    pub blocks_per_page: Option<usize>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Transcript auto-save path.
    pub transcript: Option<PathBuf>,
    /// Fail on malformed UTF-8.
    pub strict_utf8: Option<bool>,
    /// Use ANSI colors.
    pub color: Option<bool>,
}

/// Resolved studio configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    /// Backend base URL.
    pub base_url: String,

    /// Title used when saving generated ebooks.
    pub title: String,

    /// Initial preview layout.
    pub layout: LayoutMode,

    /// Paragraph blocks per preview page.
    pub blocks_per_page: usize,

    /// Request timeout.  `None` lets streams run as long as the backend writes.
    pub timeout: Option<Duration>,

    /// Transcript auto-save path for the chat surface.
    pub transcript_path: Option<PathBuf>,

    /// Whether malformed UTF-8 in a reply is an error.
    pub strict_utf8: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl StudioConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - Base URL: `$EBOOK_STUDIO_BACKEND_URL`, else `http://localhost:8000/`
    /// - Title: Mon Ebook IA
    /// - Layout: book, 3 blocks per page
    /// - Timeout: none
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: env::var(BACKEND_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            title: DEFAULT_TITLE.to_string(),
            layout: LayoutMode::Book,
            blocks_per_page: DEFAULT_BLOCKS_PER_PAGE,
            timeout: None,
            transcript_path: None,
            strict_utf8: false,
            use_color: true,
        }
    }

    /// Resolve the command line: defaults, then the `--config` file if
    /// given, then the remaining arguments.
    pub fn from_args(args: StudioArgs) -> Result<Self> {
        let mut config = Self::new();
        if let Some(path) = &args.config {
            config = config.with_file(StudioFile::from_path(path)?);
        }
        config.with_args(args)
    }

    /// Overlay the values present in a configuration file.
    pub fn with_file(mut self, file: StudioFile) -> Self {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(title) = file.title {
            self.title = title;
        }
        if let Some(layout) = file.layout {
            self.layout = layout;
        }
        if let Some(blocks) = file.blocks_per_page {
            self.blocks_per_page = blocks;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(path) = file.transcript {
            self.transcript_path = Some(path);
        }
        if let Some(strict) = file.strict_utf8 {
            self.strict_utf8 = strict;
        }
        if let Some(color) = file.color {
            self.use_color = color;
        }
        self
    }

    /// Overlay the values given on the command line.
    pub fn with_args(mut self, args: StudioArgs) -> Result<Self> {
        if let Some(base_url) = args.base_url {
            self.base_url = base_url;
        }
        if let Some(title) = args.title {
            self.title = title;
        }
        if let Some(layout) = args.layout {
            self.layout = layout
                .parse()
                .map_err(|err| Error::validation(format!("{err}"), Some("layout".to_string())))?;
        }
        if let Some(blocks) = args.blocks_per_page {
            self.blocks_per_page = blocks as usize;
        }
        if let Some(secs) = args.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs as u64));
        }
        if let Some(path) = args.transcript {
            self.transcript_path = Some(PathBuf::from(path));
        }
        self.strict_utf8 |= args.strict_utf8;
        if args.no_color {
            self.use_color = false;
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the ebook title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the preview layout.
    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the number of blocks per page.
    pub fn with_blocks_per_page(mut self, blocks: usize) -> Self {
        self.blocks_per_page = blocks;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transcript auto-save path.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Check values that would otherwise fail later.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::validation(
                "base URL must not be empty",
                Some("base_url".to_string()),
            ));
        }
        if self.blocks_per_page == 0 {
            return Err(Error::validation(
                "blocks per page must be at least 1",
                Some("blocks_per_page".to_string()),
            ));
        }
        Ok(())
    }

    /// Configuration of the chat surface.
    pub fn chat_session(&self) -> SessionConfig {
        SessionConfig::chat()
            .with_strict_utf8(self.strict_utf8)
            .with_transcript_path(self.transcript_path.clone())
    }

    /// Configuration of the generator surface.
    pub fn generator_session(&self) -> SessionConfig {
        SessionConfig::generator()
            .with_title(self.title.clone())
            .with_layout(self.layout)
            .with_blocks_per_page(self.blocks_per_page)
            .with_strict_utf8(self.strict_utf8)
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StudioFile {
    /// Read a YAML configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config {}", path.display()), err)
        })?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Configuration of one chat surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Assistant message the transcript starts with, if any.
    pub greeting: Option<String>,

    /// Generation mode sent with every request.
    pub mode: Option<ChatMode>,

    /// Save the generated text after every completed stream.
    pub autosave: bool,

    /// Title used when saving.
    pub title: String,

    /// Preview layout, also saved as the ebook's style.
    pub layout: LayoutMode,

    /// Paragraph blocks per preview page.
    pub blocks_per_page: usize,

    /// Whether malformed UTF-8 in a reply is an error.
    pub strict_utf8: bool,

    /// Path to persist the transcript after each completed turn.
    pub transcript_path: Option<PathBuf>,
}

impl SessionConfig {
    /// The chat surface: greets the user, plain chat mode, nothing saved.
    pub fn chat() -> Self {
        Self {
            greeting: Some(GREETING.to_string()),
            mode: None,
            autosave: false,
            title: DEFAULT_TITLE.to_string(),
            layout: LayoutMode::Book,
            blocks_per_page: DEFAULT_BLOCKS_PER_PAGE,
            strict_utf8: false,
            transcript_path: None,
        }
    }

    /// The generator surface: empty transcript, ebook mode, autosave.
    pub fn generator() -> Self {
        Self {
            greeting: None,
            mode: Some(ChatMode::Ebook),
            autosave: true,
            ..Self::chat()
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the layout.
    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the number of blocks per page.
    pub fn with_blocks_per_page(mut self, blocks: usize) -> Self {
        self.blocks_per_page = blocks;
        self
    }

    /// Sets strict UTF-8 decoding.
    pub fn with_strict_utf8(mut self, strict: bool) -> Self {
        self.strict_utf8 = strict;
        self
    }

    /// Sets the transcript auto-save path.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::chat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StudioConfig {
        StudioConfig::new().with_base_url(DEFAULT_BACKEND_URL)
    }

    #[test]
    fn default_config() {
        let config = base();
        assert_eq!(config.title, "Mon Ebook IA");
        assert_eq!(config.layout, LayoutMode::Book);
        assert_eq!(config.blocks_per_page, 3);
        assert!(config.timeout.is_none());
        assert!(config.transcript_path.is_none());
        assert!(!config.strict_utf8);
        assert!(config.use_color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn args_override_defaults() {
        let args = StudioArgs {
            base_url: Some("http://studio.example/".to_string()),
            title: Some("Guide du jardin".to_string()),
            layout: Some("PDF".to_string()),
            blocks_per_page: Some(5),
            timeout_secs: Some(90),
            config: None,
            transcript: Some("chat.json".to_string()),
            strict_utf8: true,
            no_color: true,
        };
        let config = base().with_args(args).unwrap();
        assert_eq!(config.base_url, "http://studio.example/");
        assert_eq!(config.title, "Guide du jardin");
        assert_eq!(config.layout, LayoutMode::Pdf);
        assert_eq!(config.blocks_per_page, 5);
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.transcript_path, Some(PathBuf::from("chat.json")));
        assert!(config.strict_utf8);
        assert!(!config.use_color);
    }

    #[test]
    fn bad_layout_is_rejected() {
        let args = StudioArgs {
            layout: Some("epub".to_string()),
            ..StudioArgs::default()
        };
        let err = base().with_args(args).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn zero_blocks_is_rejected() {
        let args = StudioArgs {
            blocks_per_page: Some(0),
            ..StudioArgs::default()
        };
        assert!(base().with_args(args).is_err());
    }

    #[test]
    fn file_then_args() {
        let file = StudioFile::from_yaml(
            "base_url: http://file.example/\ntitle: Depuis le fichier\nlayout: scroll\ncolor: false\n",
        )
        .unwrap();
        let args = StudioArgs {
            title: Some("Depuis la ligne".to_string()),
            ..StudioArgs::default()
        };
        let config = base().with_file(file).with_args(args).unwrap();
        assert_eq!(config.base_url, "http://file.example/");
        assert_eq!(config.title, "Depuis la ligne");
        assert_eq!(config.layout, LayoutMode::Scroll);
        assert!(!config.use_color);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(StudioFile::from_yaml("").unwrap(), StudioFile::default());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(StudioFile::from_yaml("colour: true\n").is_err());
    }

    #[test]
    fn surfaces() {
        let config = base().with_title("Recettes").with_layout(LayoutMode::Scroll);

        let chat = config.chat_session();
        assert_eq!(chat.greeting.as_deref(), Some(GREETING));
        assert!(chat.mode.is_none());
        assert!(!chat.autosave);

        let generator = config.generator_session();
        assert!(generator.greeting.is_none());
        assert_eq!(generator.mode, Some(ChatMode::Ebook));
        assert!(generator.autosave);
        assert_eq!(generator.title, "Recettes");
        assert_eq!(generator.layout, LayoutMode::Scroll);
    }
}

//! The interactive studio: configuration, chat sessions, and commands.
//!
//! - [`config`]: CLI arguments, the YAML config file, and per-surface settings
//! - [`session`]: a transcript with at most one streaming reply in flight
//! - [`commands`]: slash command parsing for the REPL

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, InputLine, help_text, parse_command, parse_input};
pub use config::{
    BACKEND_URL_ENV, DEFAULT_BACKEND_URL, DEFAULT_TITLE, GREETING, SessionConfig, StudioArgs,
    StudioConfig, StudioFile,
};
pub use session::{
    APOLOGY, ChatSession, DropReason, RequestToken, SendOutcome, SessionSnapshot, SessionStats,
};

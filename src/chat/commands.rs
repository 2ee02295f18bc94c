//! Slash command parsing for the studio REPL.
//!
//! Lines starting with `/` control the studio; anything else is sent to the
//! active chat surface.

use crate::types::LayoutMode;

/// A parsed studio command.
///
/// These commands control the studio and are not sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Show the saved ebooks.
    Dashboard,

    /// Switch to the chat surface.
    Chat,

    /// Switch to the ebook generator.
    Generator,

    /// Change the preview layout.
    Layout(LayoutMode),

    /// Next book page.
    NextPage,

    /// Previous book page.
    PrevPage,

    /// Show the preview of the generated text.
    Preview,

    /// Set the title used when saving.
    Title(String),

    /// Show the current progress.
    Progress,

    /// Clear the active transcript.
    Clear,

    /// Set the auto-save transcript path.
    TranscriptPath(String),

    /// Clear the auto-save transcript path.
    ClearTranscriptPath,

    /// Save the transcript to a specific file immediately.
    SaveTranscript(String),

    /// Load conversation history from a file.
    LoadTranscript(String),

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the studio.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.
///
/// # Examples
///
/// ```
/// # use ebook_studio::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/layout pdf").is_some());
/// assert!(parse_command("Écris un guide du jardinage").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "dashboard" | "home" => ChatCommand::Dashboard,
        "chat" => ChatCommand::Chat,
        "generator" | "gen" => ChatCommand::Generator,
        "layout" => match argument {
            Some(arg) => match arg.parse::<LayoutMode>() {
                Ok(layout) => ChatCommand::Layout(layout),
                Err(err) => ChatCommand::Invalid(format!("/layout {err}")),
            },
            None => ChatCommand::Invalid("/layout requires book, scroll, or pdf".to_string()),
        },
        "next" | "n" => ChatCommand::NextPage,
        "prev" | "p" => ChatCommand::PrevPage,
        "preview" => ChatCommand::Preview,
        "title" => match argument {
            Some(arg) => ChatCommand::Title(arg.to_string()),
            None => ChatCommand::Invalid("/title requires a title".to_string()),
        },
        "progress" => ChatCommand::Progress,
        "clear" => ChatCommand::Clear,
        "transcript" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::ClearTranscriptPath,
            Some(arg) => ChatCommand::TranscriptPath(arg.to_string()),
            None => ChatCommand::Invalid("/transcript requires a file path".to_string()),
        },
        "save" => match argument {
            Some(arg) => ChatCommand::SaveTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "load" => match argument {
            Some(arg) => ChatCommand::LoadTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/load requires a file path".to_string()),
        },
        "stats" | "status" => ChatCommand::Stats,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum InputLine<'a> {
    /// Nothing but whitespace.
    Blank,

    /// A slash command.
    Command(ChatCommand),

    /// Text for the active surface, exactly as typed.
    Message(&'a str),
}

/// Classify a line typed at the prompt.
///
/// Whitespace only decides whether the line is blank or a command; a message
/// keeps its surrounding whitespace.
pub fn parse_input(line: &str) -> InputLine<'_> {
    if line.trim().is_empty() {
        return InputLine::Blank;
    }
    match parse_command(line) {
        Some(cmd) => InputLine::Command(cmd),
        None => InputLine::Message(line),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /dashboard             Show saved ebooks
  /chat                  Switch to the assistant chat
  /generator             Switch to the ebook generator
  /layout <mode>         Preview layout: book, scroll, or pdf
  /next                  Next page (book layout)
  /prev                  Previous page (book layout)
  /preview               Show the generated ebook
  /title <text>          Set the ebook title
  /progress              Show generation progress
  /clear                 Clear the conversation
  /transcript <file>     Enable auto-saving transcripts (or 'clear')
  /save <file>           Save the current transcript immediately
  /load <file>           Load a transcript from disk
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the studio

Any other line is sent to the active surface."#
}

//! Interactive ebook studio.
//!
//! A REPL over the studio backend with three views: the dashboard of saved
//! ebooks, an assistant chat, and the ebook generator with its live preview.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the local backend
//! ebook-studio
//!
//! # Another backend, pdf preview, a title for saved ebooks
//! ebook-studio --base-url https://studio.example.com/ --layout pdf --title "Guide"
//!
//! # Settings from a YAML file; command-line values win
//! ebook-studio --config studio.yaml --no-color
//! ```
//!
//! Logs go to stderr and are filtered by `EBOOK_STUDIO_LOG` (for example
//! `EBOOK_STUDIO_LOG=ebook_studio=debug`).

use std::path::PathBuf;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use ebook_studio::chat::{
    ChatCommand, ChatSession, InputLine, PlainTextRenderer, Renderer, SendOutcome, StudioArgs,
    StudioConfig, help_text, parse_input,
};
use ebook_studio::render::format_progress_bar;
use ebook_studio::{BookNavigator, Dashboard, StudioClient};

const LOG_ENV: &str = "EBOOK_STUDIO_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Dashboard,
    Chat,
    Generator,
}

impl View {
    fn prompt(&self) -> &'static str {
        match self {
            View::Dashboard => "dashboard> ",
            View::Chat => "chat> ",
            View::Generator => "ebook> ",
        }
    }
}

struct Studio {
    client: StudioClient,
    chat: ChatSession<StudioClient>,
    generator: ChatSession<StudioClient>,
    navigator: BookNavigator,
    view: View,
}

impl Studio {
    fn new(client: StudioClient, config: &StudioConfig) -> Self {
        Self {
            chat: ChatSession::new(client.clone(), config.chat_session()),
            generator: ChatSession::new(client.clone(), config.generator_session()),
            client,
            navigator: BookNavigator::new(),
            view: View::Dashboard,
        }
    }

    /// The session plain lines go to.  The dashboard sends to the generator.
    fn active(&self) -> &ChatSession<StudioClient> {
        match self.view {
            View::Chat => &self.chat,
            View::Dashboard | View::Generator => &self.generator,
        }
    }

    async fn show_dashboard(&mut self, renderer: &mut PlainTextRenderer) {
        self.view = View::Dashboard;
        let dashboard = Dashboard::load(&self.client).await;
        renderer.print_dashboard(&dashboard);
    }

    fn show_preview(&self, renderer: &mut PlainTextRenderer) {
        renderer.print_preview(&self.generator.preview(&self.navigator));
    }

    fn show_transcript(&self, renderer: &mut PlainTextRenderer) {
        renderer.print_transcript(&self.active().messages());
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Main entry point for the ebook-studio application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let (args, _) = StudioArgs::from_command_line_relaxed("ebook-studio [OPTIONS]");
    let config = StudioConfig::from_args(args)?;
    tracing::info!(base_url = %config.base_url, layout = %config.layout, "starting studio");

    let client = StudioClient::from_config(&config)?;
    let mut studio = Studio::new(client, &config);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!("Ebook Studio ({})", config.base_url);
    println!("Type /help for commands, /quit to exit\n");
    studio.show_dashboard(&mut renderer).await;

    loop {
        let readline = rl.readline(studio.view.prompt());

        match readline {
            Ok(line) => {
                let message = match parse_input(&line) {
                    InputLine::Blank => continue,
                    InputLine::Command(cmd) => {
                        let _ = rl.add_history_entry(line.trim());
                        if !handle_command(cmd, &mut studio, &mut renderer).await {
                            break;
                        }
                        continue;
                    }
                    InputLine::Message(message) => message,
                };
                let _ = rl.add_history_entry(message);

                if studio.view == View::Dashboard {
                    studio.view = View::Generator;
                    renderer.print_info("Switched to the ebook generator.");
                }
                let outcome = studio.active().send(message, &mut renderer).await;
                if let SendOutcome::Failed { error, .. } = &outcome {
                    tracing::debug!(error = %error, "reply replaced by apology");
                }
                if studio.view == View::Generator && outcome.is_completed() {
                    studio.navigator.reset();
                    renderer.print_info(&format!(
                        "{} page(s). /preview to read, /layout to change the layout.",
                        studio.generator.pages().len()
                    ));
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nAu revoir !");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

/// Apply a command; returns false when the studio should exit.
async fn handle_command(
    cmd: ChatCommand,
    studio: &mut Studio,
    renderer: &mut PlainTextRenderer,
) -> bool {
    match cmd {
        ChatCommand::Quit => {
            println!("Au revoir !");
            return false;
        }
        ChatCommand::Dashboard => studio.show_dashboard(renderer).await,
        ChatCommand::Chat => {
            studio.view = View::Chat;
            studio.show_transcript(renderer);
        }
        ChatCommand::Generator => {
            studio.view = View::Generator;
            studio.show_transcript(renderer);
        }
        ChatCommand::Layout(layout) => {
            studio.generator.set_layout(layout);
            studio.navigator.reset();
            renderer.print_info(&format!("Layout: {}", layout.label()));
            studio.show_preview(renderer);
        }
        ChatCommand::NextPage => {
            studio.navigator.next(studio.generator.pages().len());
            studio.show_preview(renderer);
        }
        ChatCommand::PrevPage => {
            studio.navigator.prev(studio.generator.pages().len());
            studio.show_preview(renderer);
        }
        ChatCommand::Preview => studio.show_preview(renderer),
        ChatCommand::Title(title) => {
            studio.generator.set_title(title.clone());
            renderer.print_info(&format!("Title set to: {title}"));
        }
        ChatCommand::Progress => {
            renderer.print_info(&format_progress_bar(studio.generator.progress()));
        }
        ChatCommand::Clear => {
            if studio.active().clear() {
                studio.navigator.reset();
                renderer.print_info("Conversation cleared.");
            } else {
                renderer.print_error("A reply is still streaming.");
            }
        }
        ChatCommand::TranscriptPath(path) => {
            studio
                .active()
                .set_transcript_path(Some(PathBuf::from(&path)));
            renderer.print_info(&format!("Transcript auto-save set to {path}"));
        }
        ChatCommand::ClearTranscriptPath => {
            studio.active().set_transcript_path(None);
            renderer.print_info("Transcript auto-save disabled.");
        }
        ChatCommand::SaveTranscript(path) => match studio.active().save_transcript_to(&path) {
            Ok(()) => renderer.print_info(&format!("Transcript saved to {path}")),
            Err(err) => renderer.print_error(&format!("Failed to save transcript: {err}")),
        },
        ChatCommand::LoadTranscript(path) => match studio.active().load_transcript_from(&path) {
            Ok(()) => {
                renderer.print_info(&format!("Transcript loaded from {path}"));
                studio.show_transcript(renderer);
            }
            Err(err) => renderer.print_error(&format!("Failed to load transcript: {err}")),
        },
        ChatCommand::Stats => print_stats(studio.active()),
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn print_stats(session: &ChatSession<StudioClient>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!("      Title: {}", stats.title);
    println!("      Layout: {}", stats.layout.label());
    println!("      Progress: {}", format_progress_bar(stats.progress));
    println!("      Pages: {}", stats.page_count);
    println!(
        "      Requests: {} ({} failed, {} dropped)",
        stats.total_requests, stats.failures, stats.dropped_sends
    );
    println!("      Saves: {} ({} failed)", stats.saves, stats.save_errors);
    match stats.transcript_path {
        Some(ref path) => println!("      Transcript file: {}", path.display()),
        None => println!("      Transcript file: (disabled)"),
    }
}

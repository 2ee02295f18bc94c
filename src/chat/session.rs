//! Chat session management.
//!
//! A [`ChatSession`] owns one transcript and at most one in-flight request.
//! Every method takes `&self`: state sits behind a mutex that is released
//! before each await, so a caller can inspect the session (or try to send
//! again) while a reply is streaming.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};
use tokio::sync::watch;

use crate::backend::StudioBackend;
use crate::chat::SessionConfig;
use crate::decoder::{StreamDecoder, Utf8Decoder};
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_DROPPED_SENDS, SESSION_FAILURES, SESSION_SAVE_ERRORS, SESSION_SENDS, STREAM_DURATION,
};
use crate::paginate::{Page, Paginator};
use crate::preview::{BookNavigator, Preview, render_preview};
use crate::progress::ProgressTracker;
use crate::render::Renderer;
use crate::types::{ChatRequest, LayoutMode, Message, SaveEbookParams};

/// The assistant message that replaces a failed reply.
pub const APOLOGY: &str = "Désolé, une erreur est survenue.";

/// Identifies one accepted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    /// The sequence number of the send, starting at 1.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Why a send was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The text was empty or whitespace.
    EmptyInput,
    /// Another send had not finished.
    Pending,
}

/// What became of a call to [`ChatSession::send`].
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The reply streamed to the end.
    Completed {
        /// The accepted request.
        request: RequestToken,
    },
    /// The request or the stream failed; the transcript ends with [`APOLOGY`].
    Failed {
        /// The accepted request.
        request: RequestToken,
        /// The cause, for logging.
        error: Error,
    },
    /// Nothing was sent and the transcript is unchanged.
    Dropped(DropReason),
}

impl SendOutcome {
    /// Returns true if the reply completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, SendOutcome::Completed { .. })
    }

    /// Returns true if the request failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, SendOutcome::Failed { .. })
    }

    /// Returns true if the send was ignored.
    pub fn is_dropped(&self) -> bool {
        matches!(self, SendOutcome::Dropped(_))
    }
}

/// Immutable view of a session, published to subscribers on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// The transcript.
    pub messages: Vec<Message>,
    /// Text accumulated by the current or last stream.
    pub text: String,
    /// Last extracted progress.
    pub progress: u8,
    /// Whether a send is in flight.
    pub pending: bool,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The number of messages in the transcript.
    pub message_count: usize,
    /// Title used when saving.
    pub title: String,
    /// Current preview layout.
    pub layout: LayoutMode,
    /// Last extracted progress.
    pub progress: u8,
    /// Pages in the current pagination.
    pub page_count: usize,
    /// Whether a send is in flight.
    pub pending: bool,
    /// Accepted sends.
    pub total_requests: u64,
    /// Sends that ended with the apology.
    pub failures: u64,
    /// Sends ignored because of empty input or a pending send.
    pub dropped_sends: u64,
    /// Successful saves.
    pub saves: u64,
    /// Failed saves.
    pub save_errors: u64,
    /// The auto-save transcript path, if set.
    pub transcript_path: Option<PathBuf>,
}

struct State {
    messages: Vec<Message>,
    text: String,
    progress: ProgressTracker,
    pending: Option<RequestToken>,
    next_request: u64,
    title: String,
    layout: LayoutMode,
    transcript_path: Option<PathBuf>,
    total_requests: u64,
    failures: u64,
    dropped_sends: u64,
    saves: u64,
    save_errors: u64,
}

impl State {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            text: self.text.clone(),
            progress: self.progress.value(),
            pending: self.pending.is_some(),
        }
    }
}

/// A chat session over a [`StudioBackend`].
pub struct ChatSession<B: StudioBackend> {
    backend: B,
    config: SessionConfig,
    paginator: Paginator,
    state: Mutex<State>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl<B: StudioBackend> ChatSession<B> {
    /// Creates a session; the transcript starts with the configured greeting.
    pub fn new(backend: B, config: SessionConfig) -> Self {
        let messages = config
            .greeting
            .iter()
            .map(Message::assistant)
            .collect::<Vec<_>>();
        let state = State {
            messages,
            text: String::new(),
            progress: ProgressTracker::new(),
            pending: None,
            next_request: 1,
            title: config.title.clone(),
            layout: config.layout,
            transcript_path: config.transcript_path.clone(),
            total_requests: 0,
            failures: 0,
            dropped_sends: 0,
            saves: 0,
            save_errors: 0,
        };
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            backend,
            paginator: Paginator::new(config.blocks_per_page),
            config,
            state: Mutex::new(state),
            snapshots,
        }
    }

    /// The backend this session talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The surface configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        let snapshot = self.state().snapshot();
        self.snapshots.send_replace(snapshot);
    }

    /// Send `text` and stream the reply into the transcript.
    ///
    /// Empty input, or a send while another is pending, changes nothing and
    /// is reported as [`SendOutcome::Dropped`].  Failures never escape as
    /// errors: the reply is replaced by [`APOLOGY`] and the cause is returned
    /// in [`SendOutcome::Failed`].
    pub async fn send(&self, text: &str, renderer: &mut dyn Renderer) -> SendOutcome {
        if text.trim().is_empty() {
            return self.drop_send(DropReason::EmptyInput);
        }
        let (request, body) = {
            let mut state = self.state();
            if state.pending.is_some() {
                drop(state);
                return self.drop_send(DropReason::Pending);
            }
            let request = RequestToken(state.next_request);
            state.next_request += 1;
            state.pending = Some(request);
            state.total_requests += 1;
            state.messages.push(Message::user(text));
            let body = ChatRequest::new(text, state.messages.clone()).with_mode(self.config.mode);
            (request, body)
        };
        SESSION_SENDS.click();
        self.publish();
        tracing::debug!(
            request = request.id(),
            history = body.history.len(),
            "sending message"
        );

        let bytes = match self.backend.chat(&body).await {
            Ok(bytes) => bytes,
            Err(err) => return self.fail(request, err, false, renderer),
        };

        {
            let mut state = self.state();
            state.messages.push(Message::assistant(""));
            state.text.clear();
            state.progress.reset();
        }
        self.publish();
        renderer.start_response();

        let decoder = if self.config.strict_utf8 {
            Utf8Decoder::strict()
        } else {
            Utf8Decoder::lossy()
        };
        let mut fragments = StreamDecoder::with_decoder(bytes, decoder);
        let start = Instant::now();
        let mut progress_changed = false;
        while let Some(fragment) = fragments.next().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(err) => {
                    STREAM_DURATION.add(start.elapsed().as_secs_f64());
                    return self.fail(request, err, true, renderer);
                }
            };
            if fragment.is_empty() {
                continue;
            }
            {
                let mut state = self.state();
                let State {
                    messages,
                    text,
                    progress,
                    ..
                } = &mut *state;
                if let Some(placeholder) = messages.last_mut() {
                    placeholder.content.push_str(&fragment);
                }
                text.push_str(&fragment);
                let before = progress.value();
                progress_changed |= progress.observe(text) != before;
            }
            renderer.print_text(&fragment);
            self.publish();
        }
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        renderer.finish_response();
        if progress_changed {
            renderer.print_progress(self.progress());
        }
        tracing::debug!(
            request = request.id(),
            bytes = fragments.bytes_read(),
            fragments = fragments.fragments(),
            "reply complete"
        );

        if self.config.autosave {
            self.save_ebook().await;
        }

        self.state().pending = None;
        if let Err(err) = self.auto_save_transcript() {
            tracing::warn!(error = %err, "could not save transcript");
            renderer.print_error(&format!("Failed to save transcript: {err}"));
        }
        self.publish();
        SendOutcome::Completed { request }
    }

    fn drop_send(&self, reason: DropReason) -> SendOutcome {
        SESSION_DROPPED_SENDS.click();
        self.state().dropped_sends += 1;
        tracing::debug!(?reason, "send dropped");
        SendOutcome::Dropped(reason)
    }

    fn fail(
        &self,
        request: RequestToken,
        error: Error,
        streaming: bool,
        renderer: &mut dyn Renderer,
    ) -> SendOutcome {
        SESSION_FAILURES.click();
        tracing::warn!(request = request.id(), error = %error, streaming, "chat request failed");
        {
            let mut state = self.state();
            let placeholder = if streaming {
                state.messages.last_mut()
            } else {
                None
            };
            match placeholder {
                Some(placeholder) => placeholder.content = APOLOGY.to_string(),
                None => state.messages.push(Message::assistant(APOLOGY)),
            }
            state.failures += 1;
            state.pending = None;
        }
        if streaming {
            renderer.finish_response();
        }
        renderer.start_response();
        renderer.print_text(APOLOGY);
        renderer.finish_response();
        self.publish();
        SendOutcome::Failed { request, error }
    }

    async fn save_ebook(&self) {
        let params = {
            let state = self.state();
            SaveEbookParams {
                title: state.title.clone(),
                content: state.text.clone(),
                style: state.layout,
                progress: state.progress.value(),
            }
        };
        match self.backend.save_ebook(&params).await {
            Ok(()) => {
                self.state().saves += 1;
                tracing::debug!(title = %params.title, progress = params.progress, "ebook saved");
            }
            Err(err) => {
                SESSION_SAVE_ERRORS.click();
                self.state().save_errors += 1;
                tracing::warn!(title = %params.title, error = %err, "could not save ebook");
            }
        }
    }

    /// A receiver of snapshots, starting with the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// The current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    /// Returns true while a send is in flight.
    pub fn is_pending(&self) -> bool {
        self.state().pending.is_some()
    }

    /// A copy of the transcript.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    /// Returns the number of messages in the transcript.
    pub fn message_count(&self) -> usize {
        self.state().messages.len()
    }

    /// Last extracted progress.
    pub fn progress(&self) -> u8 {
        self.state().progress.value()
    }

    /// Text accumulated by the current or last stream.
    pub fn accumulated_text(&self) -> String {
        self.state().text.clone()
    }

    /// The accumulated text, paginated afresh.
    pub fn pages(&self) -> Vec<Page> {
        let text = self.accumulated_text();
        self.paginator.paginate(&text)
    }

    /// The preview of the accumulated text in the current layout.
    pub fn preview(&self, navigator: &BookNavigator) -> Preview {
        let (text, layout) = {
            let state = self.state();
            (state.text.clone(), state.layout)
        };
        let pages = self.paginator.paginate(&text);
        render_preview(&pages, &text, layout, navigator)
    }

    /// Reset the transcript to its initial state.  Refused while a send is
    /// pending; returns whether the session was cleared.
    pub fn clear(&self) -> bool {
        {
            let mut state = self.state();
            if state.pending.is_some() {
                return false;
            }
            state.messages = self
                .config
                .greeting
                .iter()
                .map(Message::assistant)
                .collect();
            state.text.clear();
            state.progress.reset();
        }
        self.publish();
        true
    }

    /// Sets the title used when saving.
    pub fn set_title(&self, title: impl Into<String>) {
        self.state().title = title.into();
    }

    /// Title used when saving.
    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    /// Sets the preview layout.
    pub fn set_layout(&self, layout: LayoutMode) {
        self.state().layout = layout;
    }

    /// The preview layout.
    pub fn layout(&self) -> LayoutMode {
        self.state().layout
    }

    /// Sets the auto-save transcript path.
    pub fn set_transcript_path(&self, path: Option<PathBuf>) {
        self.state().transcript_path = path;
    }

    /// Returns the configured transcript path, if any.
    pub fn transcript_path(&self) -> Option<PathBuf> {
        self.state().transcript_path.clone()
    }

    /// Saves the transcript to the specified path.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let transcript = TranscriptFile::new(self.messages());
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Loads a transcript from disk, replacing the current one.
    pub fn load_transcript_from<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(Error::validation(
                format!("unsupported transcript version {}", transcript.version),
                Some("version".to_string()),
            ));
        }
        {
            let mut state = self.state();
            if state.pending.is_some() {
                return Err(Error::validation(
                    "cannot load a transcript while a reply is streaming",
                    None,
                ));
            }
            state.messages = transcript.messages;
        }
        self.publish();
        Ok(())
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let page_count = self.pages().len();
        let state = self.state();
        SessionStats {
            message_count: state.messages.len(),
            title: state.title.clone(),
            layout: state.layout,
            progress: state.progress.value(),
            page_count,
            pending: state.pending.is_some(),
            total_requests: state.total_requests,
            failures: state.failures,
            dropped_sends: state.dropped_sends,
            saves: state.saves,
            save_errors: state.save_errors,
            transcript_path: state.transcript_path.clone(),
        }
    }

    fn auto_save_transcript(&self) -> Result<()> {
        match self.transcript_path() {
            Some(path) => self.save_transcript_to(path),
            None => Ok(()),
        }
    }
}

const TRANSCRIPT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    messages: Vec<Message>,
}

impl TranscriptFile {
    fn new(messages: Vec<Message>) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::GREETING;
    use crate::decoder::ByteStream;
    use crate::types::{ChatMode, EbookRecord};
    use bytes::Bytes;
    use futures::stream;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct ScriptedBackend {
        chunks: Vec<Result<Bytes>>,
        open_error: Option<Error>,
        save_error: Option<Error>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        requests: Mutex<Vec<ChatRequest>>,
        saved: Mutex<Vec<SaveEbookParams>>,
    }

    impl ScriptedBackend {
        fn replying(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks
                    .iter()
                    .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                    .collect(),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn saved(&self) -> Vec<SaveEbookParams> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl StudioBackend for ScriptedBackend {
        async fn chat(&self, request: &ChatRequest) -> Result<ByteStream> {
            self.requests.lock().unwrap().push(request.clone());
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if let Some(err) = &self.open_error {
                return Err(err.clone());
            }
            Ok(Box::pin(stream::iter(self.chunks.clone())))
        }

        async fn list_ebooks(&self) -> Result<Vec<EbookRecord>> {
            Ok(vec![])
        }

        async fn save_ebook(&self, params: &SaveEbookParams) -> Result<()> {
            self.saved.lock().unwrap().push(params.clone());
            match &self.save_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        text: String,
        responses: usize,
        progress: Vec<u8>,
        errors: Vec<String>,
    }

    impl Renderer for Recorder {
        fn start_response(&mut self) {
            self.responses += 1;
        }

        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn finish_response(&mut self) {}

        fn print_progress(&mut self, progress: u8) {
            self.progress.push(progress);
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_info(&mut self, _: &str) {}
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ebook-studio-{}-{name}", std::process::id()))
    }

    #[test]
    fn chat_surface_starts_with_greeting() {
        let session = ChatSession::new(ScriptedBackend::default(), SessionConfig::chat());
        assert_eq!(session.messages(), vec![Message::assistant(GREETING)]);
        assert!(!session.is_pending());
        assert_eq!(session.progress(), 0);
    }

    #[test]
    fn generator_surface_starts_empty() {
        let session = ChatSession::new(ScriptedBackend::default(), SessionConfig::generator());
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.pages().len(), 1);
        assert_eq!(session.pages()[0].content, "Page vide");
    }

    #[tokio::test]
    async fn streams_story_end_to_end() {
        let backend = ScriptedBackend::replying(&["Once", " upon", " a time.\n\n[progress:100]"]);
        let session = ChatSession::new(backend, SessionConfig::generator());
        let mut renderer = Recorder::default();

        let outcome = session.send("Write a short story", &mut renderer).await;
        assert!(outcome.is_completed());

        let content = "Once upon a time.\n\n[progress:100]";
        assert_eq!(
            session.messages(),
            vec![
                Message::user("Write a short story"),
                Message::assistant(content)
            ]
        );
        assert_eq!(session.accumulated_text(), content);
        assert_eq!(session.progress(), 100);
        assert_eq!(session.pages().len(), 1);
        assert!(!session.is_pending());
        assert_eq!(renderer.text, content);
        assert_eq!(renderer.progress, vec![100]);

        let requests = session.backend().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "Write a short story");
        assert_eq!(requests[0].history, vec![Message::user("Write a short story")]);
        assert_eq!(requests[0].mode, Some(ChatMode::Ebook));
    }

    #[tokio::test]
    async fn history_includes_the_new_message() {
        let backend = ScriptedBackend::replying(&["Salut"]);
        let session = ChatSession::new(backend, SessionConfig::chat());
        session.send("Bonjour", &mut Recorder::default()).await;
        let requests = session.backend().requests();
        assert_eq!(
            requests[0].history,
            vec![Message::assistant(GREETING), Message::user("Bonjour")]
        );
        assert_eq!(requests[0].mode, None);
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_sent_as_typed() {
        let backend = ScriptedBackend::replying(&["Salut"]);
        let session = ChatSession::new(backend, SessionConfig::generator());
        let outcome = session.send("  Bonjour \n", &mut Recorder::default()).await;
        assert!(outcome.is_completed());
        let requests = session.backend().requests();
        assert_eq!(requests[0].message, "  Bonjour \n");
        assert_eq!(requests[0].history, vec![Message::user("  Bonjour \n")]);
        assert_eq!(session.messages()[0], Message::user("  Bonjour \n"));
    }

    #[tokio::test]
    async fn marker_split_across_fragments() {
        let backend = ScriptedBackend::replying(&["Chapitre 1 [progr", "ess:40] suite"]);
        let session = ChatSession::new(backend, SessionConfig::generator());
        session.send("Écris", &mut Recorder::default()).await;
        assert_eq!(session.progress(), 40);
    }

    #[tokio::test]
    async fn transport_failure_appends_one_apology() {
        let backend = ScriptedBackend {
            open_error: Some(Error::transport(Some(500), "Internal Server Error")),
            ..ScriptedBackend::default()
        };
        let session = ChatSession::new(backend, SessionConfig::chat());
        let mut renderer = Recorder::default();

        let outcome = session.send("Bonjour", &mut renderer).await;
        match outcome {
            SendOutcome::Failed { error, .. } => assert_eq!(error.status_code(), Some(500)),
            other => panic!("expected failure, got {other:?}"),
        }
        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], Message::assistant(APOLOGY));
        assert_eq!(
            messages.iter().filter(|m| m.content == APOLOGY).count(),
            1
        );
        assert!(!session.is_pending());
        assert_eq!(renderer.text, APOLOGY);
        assert_eq!(session.stats().failures, 1);
    }

    #[tokio::test]
    async fn stream_failure_replaces_placeholder() {
        let backend = ScriptedBackend {
            chunks: vec![
                Ok(Bytes::from_static(b"Il etait")),
                Err(Error::streaming("connection reset", None)),
            ],
            ..ScriptedBackend::default()
        };
        let session = ChatSession::new(backend, SessionConfig::generator());
        let outcome = session.send("Écris", &mut Recorder::default()).await;
        assert!(outcome.is_failed());
        assert_eq!(
            session.messages(),
            vec![Message::user("Écris"), Message::assistant(APOLOGY)]
        );
        assert!(!session.is_pending());
        assert!(session.backend().saved().is_empty());
    }

    #[tokio::test]
    async fn strict_decoding_failure_is_apology() {
        let backend = ScriptedBackend {
            chunks: vec![Ok(Bytes::from_static(b"ok \xff"))],
            ..ScriptedBackend::default()
        };
        let config = SessionConfig::chat().with_strict_utf8(true);
        let session = ChatSession::new(backend, config);
        let outcome = session.send("Bonjour", &mut Recorder::default()).await;
        match outcome {
            SendOutcome::Failed { error, .. } => assert!(error.is_decode()),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(session.messages().last(), Some(&Message::assistant(APOLOGY)));
    }

    #[tokio::test]
    async fn empty_input_is_dropped() {
        let session = ChatSession::new(ScriptedBackend::default(), SessionConfig::chat());
        let outcome = session.send("  \n ", &mut Recorder::default()).await;
        assert!(matches!(outcome, SendOutcome::Dropped(DropReason::EmptyInput)));
        assert_eq!(session.message_count(), 1);
        assert!(session.backend().requests().is_empty());
        assert_eq!(session.stats().dropped_sends, 1);
    }

    #[tokio::test]
    async fn second_send_while_pending_is_dropped() {
        let (release, gate) = oneshot::channel();
        let backend = ScriptedBackend {
            gate: Mutex::new(Some(gate)),
            ..ScriptedBackend::replying(&["Réponse"])
        };
        let session = ChatSession::new(backend, SessionConfig::generator());
        let mut first_renderer = Recorder::default();
        let mut second_renderer = Recorder::default();

        let first = session.send("premier", &mut first_renderer);
        let second = async {
            while !session.is_pending() {
                tokio::task::yield_now().await;
            }
            let outcome = session.send("second", &mut second_renderer).await;
            let _ = release.send(());
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_completed());
        assert!(matches!(second, SendOutcome::Dropped(DropReason::Pending)));
        assert_eq!(session.backend().requests().len(), 1);
        assert_eq!(
            session.messages(),
            vec![Message::user("premier"), Message::assistant("Réponse")]
        );
        assert_eq!(session.stats().dropped_sends, 1);
    }

    #[tokio::test]
    async fn autosave_sends_completed_text() {
        let backend = ScriptedBackend::replying(&["Intro\n\n", "[progress:60]"]);
        let config = SessionConfig::generator().with_title("Recettes");
        let session = ChatSession::new(backend, config);
        session.set_layout(LayoutMode::Pdf);
        session.send("Écris", &mut Recorder::default()).await;

        assert_eq!(
            session.backend().saved(),
            vec![SaveEbookParams {
                title: "Recettes".to_string(),
                content: "Intro\n\n[progress:60]".to_string(),
                style: LayoutMode::Pdf,
                progress: 60,
            }]
        );
        assert_eq!(session.stats().saves, 1);
    }

    #[tokio::test]
    async fn chat_surface_does_not_save() {
        let session = ChatSession::new(ScriptedBackend::replying(&["Salut"]), SessionConfig::chat());
        session.send("Bonjour", &mut Recorder::default()).await;
        assert!(session.backend().saved().is_empty());
    }

    #[tokio::test]
    async fn save_failure_is_swallowed() {
        let backend = ScriptedBackend {
            save_error: Some(Error::transport(Some(503), "Service Unavailable")),
            ..ScriptedBackend::replying(&["Texte"])
        };
        let session = ChatSession::new(backend, SessionConfig::generator());
        let outcome = session.send("Écris", &mut Recorder::default()).await;
        assert!(outcome.is_completed());
        assert_eq!(session.messages().last(), Some(&Message::assistant("Texte")));
        assert_eq!(session.stats().save_errors, 1);
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn subscribers_see_final_snapshot() {
        let session = ChatSession::new(ScriptedBackend::replying(&["A", "B"]), SessionConfig::generator());
        let receiver = session.subscribe();
        session.send("Écris", &mut Recorder::default()).await;
        let snapshot = receiver.borrow().clone();
        assert_eq!(snapshot.text, "AB");
        assert!(!snapshot.pending);
        assert_eq!(snapshot, session.snapshot());
    }

    #[tokio::test]
    async fn new_send_restarts_text_and_progress() {
        let session = ChatSession::new(
            ScriptedBackend::replying(&["Suite [progress:30]"]),
            SessionConfig::generator(),
        );
        session.send("un", &mut Recorder::default()).await;
        session.send("deux", &mut Recorder::default()).await;
        assert_eq!(session.accumulated_text(), "Suite [progress:30]");
        assert_eq!(session.message_count(), 4);
        assert_eq!(session.stats().total_requests, 2);
    }

    #[tokio::test]
    async fn preview_follows_layout() {
        let session = ChatSession::new(
            ScriptedBackend::replying(&["a\n\nb\n\nc\n\nd"]),
            SessionConfig::generator(),
        );
        session.send("Écris", &mut Recorder::default()).await;
        let mut navigator = BookNavigator::new();
        navigator.next(session.pages().len());
        match session.preview(&navigator) {
            Preview::Book { page, page_count } => {
                assert_eq!(page_count, 2);
                assert_eq!(page.content, "d");
            }
            other => panic!("expected book preview, got {other:?}"),
        }
        session.set_layout(LayoutMode::Scroll);
        assert_eq!(session.preview(&navigator).mode(), LayoutMode::Scroll);
    }

    #[tokio::test]
    async fn clear_restores_greeting() {
        let session = ChatSession::new(ScriptedBackend::replying(&["Salut"]), SessionConfig::chat());
        session.send("Bonjour", &mut Recorder::default()).await;
        assert!(session.clear());
        assert_eq!(session.messages(), vec![Message::assistant(GREETING)]);
        assert_eq!(session.accumulated_text(), "");
    }

    #[tokio::test]
    async fn transcript_round_trip() {
        let path = temp_path("transcript.json");
        let session = ChatSession::new(ScriptedBackend::replying(&["Salut"]), SessionConfig::chat());
        session.send("Bonjour", &mut Recorder::default()).await;
        session.save_transcript_to(&path).unwrap();

        let restored = ChatSession::new(ScriptedBackend::default(), SessionConfig::generator());
        restored.load_transcript_from(&path).unwrap();
        assert_eq!(restored.messages(), session.messages());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn transcript_auto_saves_after_reply() {
        let path = temp_path("auto.json");
        let config = SessionConfig::chat().with_transcript_path(Some(path.clone()));
        let session = ChatSession::new(ScriptedBackend::replying(&["Salut"]), config);
        session.send("Bonjour", &mut Recorder::default()).await;

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], 1);
        assert_eq!(written["messages"].as_array().unwrap().len(), 3);
        assert_eq!(written["messages"][1]["role"], "user");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_rejects_unknown_version() {
        let path = temp_path("version.json");
        std::fs::write(&path, r#"{"version": 2, "messages": []}"#).unwrap();
        let session = ChatSession::new(ScriptedBackend::default(), SessionConfig::chat());
        let err = session.load_transcript_from(&path).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(session.message_count(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn setters() {
        let session = ChatSession::new(ScriptedBackend::default(), SessionConfig::generator());
        assert_eq!(session.title(), "Mon Ebook IA");
        session.set_title("Guide");
        assert_eq!(session.title(), "Guide");
        session.set_layout(LayoutMode::Scroll);
        assert_eq!(session.layout(), LayoutMode::Scroll);
        assert_eq!(session.stats().title, "Guide");
    }
}

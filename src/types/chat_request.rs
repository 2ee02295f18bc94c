use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Generation mode requested from the chat endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Ask the backend to write ebook content and emit progress markers.
    Ebook,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The newly submitted user text.
    pub message: String,

    /// The full transcript, including the new user message.
    pub history: Vec<Message>,

    /// Optional generation mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mode: Option<ChatMode>,
}

impl ChatRequest {
    /// Create a request for `message` with the given history.
    pub fn new(message: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            message: message.into(),
            history,
            mode: None,
        }
    }

    /// Set the generation mode.
    pub fn with_mode(mut self, mode: Option<ChatMode>) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_is_omitted_when_absent() {
        let request = ChatRequest::new("Bonjour", vec![Message::user("Bonjour")]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "Bonjour",
                "history": [{"role": "user", "content": "Bonjour"}],
            })
        );
    }

    #[test]
    fn ebook_mode_serializes_lowercase() {
        let request = ChatRequest::new("Un livre", vec![]).with_mode(Some(ChatMode::Ebook));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mode"], "ebook");
    }
}

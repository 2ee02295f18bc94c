//! The seam between sessions and the studio backend.

use std::sync::Arc;

use crate::decoder::ByteStream;
use crate::error::Result;
use crate::types::{ChatRequest, EbookRecord, SaveEbookParams};

/// The three endpoints of the studio backend.
///
/// [`StudioClient`](crate::StudioClient) implements this over HTTP; tests
/// substitute in-memory backends.
#[async_trait::async_trait]
pub trait StudioBackend: Send + Sync {
    /// `POST /api/chat`: open a streamed reply.
    ///
    /// Fails with [`Error::Transport`](crate::Error::Transport) before any
    /// chunk is produced when the response is unsuccessful or has no body.
    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// `GET /api/ebook/list`: the saved ebooks.
    async fn list_ebooks(&self) -> Result<Vec<EbookRecord>>;

    /// `POST /api/ebook/save`: persist a generated ebook.
    async fn save_ebook(&self, params: &SaveEbookParams) -> Result<()>;
}

#[async_trait::async_trait]
impl<B: StudioBackend + ?Sized> StudioBackend for Arc<B> {
    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        (**self).chat(request).await
    }

    async fn list_ebooks(&self) -> Result<Vec<EbookRecord>> {
        (**self).list_ebooks().await
    }

    async fn save_ebook(&self, params: &SaveEbookParams) -> Result<()> {
        (**self).save_ebook(params).await
    }
}

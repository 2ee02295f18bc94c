//! Incremental decoding of a streamed chat reply.
//!
//! The chat endpoint streams plain UTF-8 text with no framing, so chunk
//! boundaries fall wherever the network put them, including in the middle of
//! a multi-byte character.  [`Utf8Decoder`] keeps the undecoded tail of one
//! chunk and completes it with the head of the next; [`StreamDecoder`] wraps
//! a byte stream and yields exactly one text fragment per chunk.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use encoding_rs::{CoderResult, DecoderResult, UTF_8};
use futures::Stream;

use crate::error::{Error, Result};
use crate::observability::{STREAM_BYTES, STREAM_DECODE_ERRORS, STREAM_FRAGMENTS};

/// A boxed stream of raw body chunks, as produced by a [`StudioBackend`].
///
/// [`StudioBackend`]: crate::StudioBackend
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Stateful UTF-8 decoder.
///
/// A lossy decoder replaces malformed sequences with U+FFFD, matching what a
/// browser `TextDecoder` does.  A strict decoder reports them as
/// [`Error::Decode`].  Once `last` has been passed to [`Utf8Decoder::decode`]
/// the decoder is spent.
pub struct Utf8Decoder {
    decoder: encoding_rs::Decoder,
    strict: bool,
    offset: u64,
}

impl Utf8Decoder {
    /// A decoder that substitutes U+FFFD for malformed input.
    pub fn lossy() -> Self {
        Self::new(false)
    }

    /// A decoder that fails on malformed input.
    pub fn strict() -> Self {
        Self::new(true)
    }

    fn new(strict: bool) -> Self {
        Self {
            decoder: UTF_8.new_decoder_with_bom_removal(),
            strict,
            offset: 0,
        }
    }

    /// Number of input bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Decode `chunk`, holding back any trailing partial character.
    ///
    /// With `last` set, held-back bytes are flushed: as U+FFFD when lossy,
    /// as an error when strict.
    pub fn decode(&mut self, chunk: &[u8], last: bool) -> Result<String> {
        let mut text = String::new();
        let mut src = chunk;
        loop {
            let needed = if self.strict {
                self.decoder
                    .max_utf8_buffer_length_without_replacement(src.len())
            } else {
                self.decoder.max_utf8_buffer_length(src.len())
            }
            .ok_or_else(|| Error::decode("chunk too large to decode", self.offset))?;
            text.reserve(needed);

            if self.strict {
                let (result, read) =
                    self.decoder
                        .decode_to_string_without_replacement(src, &mut text, last);
                self.offset += read as u64;
                src = &src[read..];
                match result {
                    DecoderResult::InputEmpty => return Ok(text),
                    DecoderResult::OutputFull => continue,
                    DecoderResult::Malformed(bad, after) => {
                        let at = self.offset.saturating_sub(bad as u64 + after as u64);
                        return Err(Error::decode("invalid UTF-8 sequence", at));
                    }
                }
            } else {
                let (result, read, _) = self.decoder.decode_to_string(src, &mut text, last);
                self.offset += read as u64;
                src = &src[read..];
                match result {
                    CoderResult::InputEmpty => return Ok(text),
                    CoderResult::OutputFull => continue,
                }
            }
        }
    }
}

impl Default for Utf8Decoder {
    fn default() -> Self {
        Self::lossy()
    }
}

/// Turns a stream of body chunks into a stream of text fragments.
///
/// One fragment is yielded per chunk, in arrival order; a chunk holding only
/// the start of a character yields an empty fragment.  If the body ends in
/// the middle of a character, one extra fragment carries the flushed
/// remainder.  The stream ends after the first error.
///
/// ```
/// # tokio_test::block_on(async {
/// use bytes::Bytes;
/// use futures::{StreamExt, stream};
/// use ebook_studio::{ByteStream, Result, StreamDecoder};
///
/// let chunks: Vec<Result<Bytes>> = vec![
///     Ok(Bytes::from_static(b"\xc3")),
///     Ok(Bytes::from_static(b"\xa9t\xc3\xa9")),
/// ];
/// let body: ByteStream = Box::pin(stream::iter(chunks));
/// let fragments: Vec<String> = StreamDecoder::new(body)
///     .map(|fragment| fragment.unwrap())
///     .collect()
///     .await;
/// assert_eq!(fragments, vec!["", "été"]);
/// # });
/// ```
pub struct StreamDecoder {
    inner: ByteStream,
    decoder: Utf8Decoder,
    finished: bool,
    fragments: u64,
}

impl StreamDecoder {
    /// Decode `inner` leniently.
    pub fn new(inner: ByteStream) -> Self {
        Self::with_decoder(inner, Utf8Decoder::lossy())
    }

    /// Decode `inner` with the given decoder.
    pub fn with_decoder(inner: ByteStream, decoder: Utf8Decoder) -> Self {
        Self {
            inner,
            decoder,
            finished: false,
            fragments: 0,
        }
    }

    /// Number of body bytes decoded so far.
    pub fn bytes_read(&self) -> u64 {
        self.decoder.offset()
    }

    /// Number of fragments yielded so far.
    pub fn fragments(&self) -> u64 {
        self.fragments
    }

    fn finish(&mut self, item: Result<String>) -> Poll<Option<Result<String>>> {
        self.finished = true;
        if item.is_err() {
            STREAM_DECODE_ERRORS.click();
        }
        Poll::Ready(Some(item))
    }
}

impl Stream for StreamDecoder {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                STREAM_BYTES.count(chunk.len() as u64);
                match this.decoder.decode(&chunk, false) {
                    Ok(fragment) => {
                        this.fragments += 1;
                        STREAM_FRAGMENTS.click();
                        Poll::Ready(Some(Ok(fragment)))
                    }
                    Err(err) => this.finish(Err(err)),
                }
            }
            Poll::Ready(Some(Err(err))) => {
                this.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => match this.decoder.decode(&[], true) {
                Ok(rest) if rest.is_empty() => {
                    this.finished = true;
                    Poll::Ready(None)
                }
                Ok(rest) => {
                    this.fragments += 1;
                    this.finish(Ok(rest))
                }
                Err(err) => this.finish(Err(err)),
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    fn chunks(parts: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            parts.into_iter().map(|p| Ok(Bytes::from_static(p))),
        ))
    }

    async fn fragments(decoder: StreamDecoder) -> Vec<Result<String>> {
        decoder.collect().await
    }

    #[tokio::test]
    async fn one_fragment_per_chunk() {
        let decoder = StreamDecoder::new(chunks(vec![b"Once", b" upon", b" a time."]));
        let out: Vec<String> = fragments(decoder)
            .await
            .into_iter()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(out, vec!["Once", " upon", " a time."]);
    }

    #[tokio::test]
    async fn split_multibyte_character_is_reassembled() {
        // "é" is 0xC3 0xA9 and "€" is 0xE2 0x82 0xAC.
        let decoder = StreamDecoder::new(chunks(vec![
            b"Caf\xC3",
            b"\xA9 \xE2",
            b"\x82",
            b"\xAC!",
        ]));
        let out: Vec<String> = fragments(decoder)
            .await
            .into_iter()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(out, vec!["Caf", "é ", "", "€!"]);
        assert_eq!(out.concat(), "Café €!");
    }

    #[tokio::test]
    async fn truncated_character_is_flushed_as_replacement() {
        let decoder = StreamDecoder::new(chunks(vec![b"fin \xE2\x82"]));
        let out: Vec<String> = fragments(decoder)
            .await
            .into_iter()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(out, vec!["fin ".to_string(), "\u{FFFD}".to_string()]);
    }

    #[tokio::test]
    async fn lossy_decoder_replaces_malformed_bytes() {
        let decoder = StreamDecoder::new(chunks(vec![b"a\xFFb"]));
        let out: Vec<Result<String>> = fragments(decoder).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn strict_decoder_fails_and_stops() {
        let decoder =
            StreamDecoder::with_decoder(chunks(vec![b"ok", b"a\xFFb", b"never"]), Utf8Decoder::strict());
        let out = fragments(decoder).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "ok");
        let err = out[1].as_ref().unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let inner: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(b"ignored")),
        ]));
        let mut decoder = StreamDecoder::new(inner);
        assert_eq!(decoder.next().await.unwrap().unwrap(), "partial");
        assert!(decoder.next().await.unwrap().unwrap_err().is_streaming());
        assert!(decoder.next().await.is_none());
        assert_eq!(decoder.fragments(), 1);
        assert_eq!(decoder.bytes_read(), 7);
    }

    #[test]
    fn utf8_bom_is_removed() {
        let mut decoder = Utf8Decoder::lossy();
        assert_eq!(decoder.decode(b"\xEF\xBB\xBFtexte", true).unwrap(), "texte");
    }
}

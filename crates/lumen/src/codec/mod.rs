//! The value codec seam.
//!
//! A codec turns a [`Value`] (possibly holding deferred values) into a byte
//! stream and back. The resumable variant splits the encoding into a shell
//! that can be embedded in the document right away plus a stream of chunks
//! that fill in deferred values as they settle.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::value::Value;

mod form;
mod ndjson;

pub use form::{decode_form, encode_form};
pub use ndjson::NdjsonCodec;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed stream: {0}")]
    Malformed(String),

    #[error("invalid form body: {0}")]
    Form(String),

    #[error("stream ended before the shell")]
    Empty,

    #[error("transport failed: {0}")]
    Transport(String),
}

pub type ByteStream = BoxStream<'static, Result<Bytes, CodecError>>;

/// Output of [`Codec::encode_resumable`].
pub struct Resumable {
    /// Encoding of everything known now; deferred values are placeholders.
    pub shell: String,
    /// One chunk per settled placeholder, absent when nothing was deferred.
    pub resume: Option<BoxStream<'static, String>>,
}

#[async_trait]
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value as a self-contained byte stream.
    fn encode(&self, value: Value) -> ByteStream;

    /// Decodes a stream produced by [`encode`](Codec::encode).
    ///
    /// Returns as soon as the shell is read; deferred values keep filling in
    /// while the rest of the stream arrives.
    async fn decode(&self, stream: ByteStream) -> Result<Value, CodecError>;

    fn encode_resumable(&self, value: Value) -> Resumable;

    /// Decodes a shell and lazily applies chunks from `resume`.
    fn decode_resumable(
        &self,
        shell: &str,
        resume: BoxStream<'static, String>,
    ) -> Result<Value, CodecError>;

    /// Decodes a form-encoded positional argument list.
    fn decode_form(&self, body: &[u8]) -> Result<Vec<Value>, CodecError> {
        decode_form(body)
    }
}

/// Makes JSON text safe to place inside an inline `<script>` element.
pub fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    out
}

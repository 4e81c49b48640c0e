// File: src/codec/ndjson.rs
// Purpose: Default codec: newline-delimited JSON with numbered placeholders for deferred values
//
// Line 1 is the shell: one tagged node tree.
//   {"t":"u"}                     undefined
//   {"t":"j","v":<json>}          plain JSON
//   {"t":"a","v":[node...]}       array
//   {"t":"o","v":[[key,node]...]} ordered object
//   {"t":"d","id":n}              deferred, still pending
//   {"t":"r","v":node}            deferred, already resolved
//   {"t":"x","e":"msg"}           deferred, already rejected
// Every further line settles one placeholder: {"id":n,"ok":node} or {"id":n,"err":"msg"}.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, FuturesUnordered};
use futures::StreamExt;
use serde_json::{json, Map, Value as JsonValue};

use super::{ByteStream, Codec, CodecError, Resumable};
use crate::value::{Deferred, DeferredState, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonCodec;

#[derive(Default)]
struct Encoder {
    next_id: u64,
    pending: Vec<(u64, Deferred)>,
}

impl Encoder {
    fn node(&mut self, value: &Value) -> JsonValue {
        match value {
            Value::Undefined => json!({ "t": "u" }),
            Value::Json(json) => json!({ "t": "j", "v": json }),
            Value::Array(items) => {
                let nodes: Vec<JsonValue> = items.iter().map(|item| self.node(item)).collect();
                json!({ "t": "a", "v": nodes })
            }
            Value::Object(entries) => {
                let pairs: Vec<JsonValue> = entries
                    .iter()
                    .map(|(key, item)| json!([key, self.node(item)]))
                    .collect();
                json!({ "t": "o", "v": pairs })
            }
            Value::Deferred(deferred) => match deferred.state() {
                DeferredState::Pending => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.pending.push((id, deferred.clone()));
                    json!({ "t": "d", "id": id })
                }
                DeferredState::Resolved(inner) => json!({ "t": "r", "v": self.node(&inner) }),
                DeferredState::Rejected(message) => json!({ "t": "x", "e": message }),
            },
        }
    }
}

fn settle(id: u64, deferred: Deferred) -> BoxFuture<'static, (u64, Result<Value, String>)> {
    Box::pin(async move { (id, deferred.settled().await) })
}

/// Chunks for every placeholder the encoder handed out, in settlement order.
/// Values that settle into further deferreds extend the stream.
fn resume_stream(mut encoder: Encoder) -> Option<BoxStream<'static, String>> {
    if encoder.pending.is_empty() {
        return None;
    }
    let stream = async_stream::stream! {
        let mut inflight = FuturesUnordered::new();
        for (id, deferred) in encoder.pending.drain(..) {
            inflight.push(settle(id, deferred));
        }
        while let Some((id, result)) = inflight.next().await {
            let chunk = match result {
                Ok(value) => json!({ "id": id, "ok": encoder.node(&value) }),
                Err(message) => json!({ "id": id, "err": message }),
            };
            for (id, deferred) in encoder.pending.drain(..) {
                inflight.push(settle(id, deferred));
            }
            yield chunk.to_string();
        }
    };
    Some(stream.boxed())
}

#[derive(Default)]
struct Decoder {
    placeholders: HashMap<u64, Deferred>,
}

fn malformed(message: impl Into<String>) -> CodecError {
    CodecError::Malformed(message.into())
}

fn take(map: &mut Map<String, JsonValue>, key: &str) -> Result<JsonValue, CodecError> {
    map.remove(key)
        .ok_or_else(|| malformed(format!("node is missing `{key}`")))
}

impl Decoder {
    fn value(&mut self, node: JsonValue) -> Result<Value, CodecError> {
        let JsonValue::Object(mut map) = node else {
            return Err(malformed("node must be an object"));
        };
        let tag = take(&mut map, "t")?;
        match tag.as_str() {
            Some("u") => Ok(Value::Undefined),
            Some("j") => Ok(Value::Json(take(&mut map, "v")?)),
            Some("a") => {
                let JsonValue::Array(items) = take(&mut map, "v")? else {
                    return Err(malformed("array node without items"));
                };
                items
                    .into_iter()
                    .map(|item| self.value(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Some("o") => {
                let JsonValue::Array(pairs) = take(&mut map, "v")? else {
                    return Err(malformed("object node without entries"));
                };
                let mut entries = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    let JsonValue::Array(mut pair) = pair else {
                        return Err(malformed("object entry must be a pair"));
                    };
                    if pair.len() != 2 {
                        return Err(malformed("object entry must be a pair"));
                    }
                    let item = pair.pop().unwrap_or(JsonValue::Null);
                    let Some(JsonValue::String(key)) = pair.pop() else {
                        return Err(malformed("object key must be a string"));
                    };
                    entries.push((key, self.value(item)?));
                }
                Ok(Value::Object(entries))
            }
            Some("d") => {
                let id = take(&mut map, "id")?
                    .as_u64()
                    .ok_or_else(|| malformed("placeholder id must be a number"))?;
                let deferred = Deferred::pending();
                self.placeholders.insert(id, deferred.clone());
                Ok(Value::Deferred(deferred))
            }
            Some("r") => {
                let inner = self.value(take(&mut map, "v")?)?;
                Ok(Value::Deferred(Deferred::resolved(inner)))
            }
            Some("x") => {
                let message = take(&mut map, "e")?;
                Ok(Value::Deferred(Deferred::rejected(
                    message.as_str().unwrap_or("rejected"),
                )))
            }
            _ => Err(malformed(format!("unknown node tag {tag}"))),
        }
    }

    fn apply(&mut self, line: &str) -> Result<(), CodecError> {
        let JsonValue::Object(mut chunk) = serde_json::from_str(line)? else {
            return Err(malformed("chunk must be an object"));
        };
        let id = take(&mut chunk, "id")?
            .as_u64()
            .ok_or_else(|| malformed("chunk id must be a number"))?;
        let target = self
            .placeholders
            .get(&id)
            .cloned()
            .ok_or_else(|| malformed(format!("chunk for unknown placeholder {id}")))?;

        if let Some(node) = chunk.remove("ok") {
            let value = self.value(node)?;
            target.resolve(value);
        } else if let Some(err) = chunk.remove("err") {
            target.reject(err.as_str().unwrap_or("rejected"));
        } else {
            return Err(malformed("chunk carries neither `ok` nor `err`"));
        }
        Ok(())
    }

    fn has_pending(&self) -> bool {
        self.placeholders.values().any(Deferred::is_pending)
    }

    async fn drain(mut self, mut resume: BoxStream<'static, String>) {
        while let Some(line) = resume.next().await {
            if let Err(err) = self.apply(&line) {
                tracing::warn!(error = %err, "dropping malformed resume chunk");
            }
        }
        for deferred in self.placeholders.values() {
            deferred.reject("stream closed before the value settled");
        }
    }
}

/// Splits a byte stream into lines, skipping empty ones.
fn lines(mut bytes: ByteStream) -> BoxStream<'static, Result<String, CodecError>> {
    let stream = async_stream::stream! {
        let mut buf: Vec<u8> = Vec::new();
        let mut failed = false;
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(err) => {
                    failed = true;
                    yield Err(err);
                    break;
                }
            }
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                if !text.trim().is_empty() {
                    yield Ok(text);
                }
            }
        }
        if !failed && !buf.is_empty() {
            let text = String::from_utf8_lossy(&buf).into_owned();
            if !text.trim().is_empty() {
                yield Ok(text);
            }
        }
    };
    stream.boxed()
}

#[async_trait]
impl Codec for NdjsonCodec {
    fn encode(&self, value: Value) -> ByteStream {
        let mut encoder = Encoder::default();
        let shell = format!("{}\n", encoder.node(&value));
        let head = stream::once(async move { Ok(Bytes::from(shell)) });
        match resume_stream(encoder) {
            None => head.boxed(),
            Some(resume) => head
                .chain(resume.map(|line| Ok(Bytes::from(format!("{line}\n")))))
                .boxed(),
        }
    }

    async fn decode(&self, stream: ByteStream) -> Result<Value, CodecError> {
        let mut lines = lines(stream);
        let shell = match lines.next().await {
            Some(line) => line?,
            None => return Err(CodecError::Empty),
        };
        let rest = lines.filter_map(|line| async move {
            match line {
                Ok(line) => Some(line),
                Err(err) => {
                    tracing::warn!(error = %err, "codec stream failed after the shell");
                    None
                }
            }
        });
        self.decode_resumable(&shell, rest.boxed())
    }

    fn encode_resumable(&self, value: Value) -> Resumable {
        let mut encoder = Encoder::default();
        let shell = encoder.node(&value).to_string();
        Resumable {
            shell,
            resume: resume_stream(encoder),
        }
    }

    fn decode_resumable(
        &self,
        shell: &str,
        resume: BoxStream<'static, String>,
    ) -> Result<Value, CodecError> {
        let mut decoder = Decoder::default();
        let value = decoder.value(serde_json::from_str(shell)?)?;
        if decoder.has_pending() {
            tokio::spawn(decoder.drain(resume));
        }
        Ok(value)
    }
}

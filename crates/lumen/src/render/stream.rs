// File: src/render/stream.rs
// Purpose: Drive an engine into a streamed HTML response with resume scripts and a hard deadline

use std::convert::Infallible;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::time::{timeout_at, Instant};

use super::scripts::{chunk_script, close_script};
use super::{abort_pair, AbortHandle, MarkupStream, RenderEngine, RenderError, RenderRequest, ViewTree};
use crate::codec::{Codec, Resumable};
use crate::context::AppContext;
use crate::headers::HTML_CONTENT_TYPE;
use crate::response::ResponseInit;

static NEXT_WRITER: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    NotStarted,
    ShellPending,
    Streaming,
    Complete,
    Aborted,
    ShellError,
}

impl RenderPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RenderPhase::ShellPending,
            2 => RenderPhase::Streaming,
            3 => RenderPhase::Complete,
            4 => RenderPhase::Aborted,
            5 => RenderPhase::ShellError,
            _ => RenderPhase::NotStarted,
        }
    }
}

/// Final status and phase of a streamed render.
///
/// Attached to the response as an extension. Headers are long gone by the
/// time a late error happens, so this is the only place the eventual 500
/// shows up.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    status: Arc<AtomicU16>,
    phase: Arc<AtomicU8>,
}

impl RenderOutcome {
    fn new(status: StatusCode) -> Self {
        Self {
            status: Arc::new(AtomicU16::new(status.as_u16())),
            phase: Arc::new(AtomicU8::new(RenderPhase::NotStarted as u8)),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status.load(Ordering::SeqCst))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn phase(&self) -> RenderPhase {
        RenderPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn enter(&self, phase: RenderPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    fn fail(&self) {
        self.status
            .store(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), Ordering::SeqCst);
    }
}

/// Renders `tree` as a streamed document.
///
/// Resolves once the engine has produced its shell; everything after that
/// is written to the response body as it arrives. Fails, with nothing sent,
/// if the engine errors or stalls before the shell.
pub async fn render_document(
    engine: Arc<dyn RenderEngine>,
    codec: &dyn Codec,
    tree: ViewTree,
    context: AppContext,
    init: ResponseInit,
    budget: Duration,
) -> Result<Response, RenderError> {
    let outcome = RenderOutcome::new(init.status_or_ok());
    let deadline = Instant::now() + budget;
    let writer_id = NEXT_WRITER.fetch_add(1, Ordering::Relaxed);
    let Resumable { shell, resume } = codec.encode_resumable(context.to_value());
    let (abort, signal) = abort_pair();

    outcome.enter(RenderPhase::ShellPending);
    let mut markup = engine.render_to_stream(RenderRequest {
        tree,
        context,
        shell,
        has_resume: resume.is_some(),
        writer_id,
        abort: signal,
    });

    let shell_markup = match timeout_at(deadline, markup.next()).await {
        Ok(Some(Ok(chunk))) => chunk,
        Ok(Some(Err(err))) => {
            outcome.enter(RenderPhase::ShellError);
            return Err(err);
        }
        Ok(None) => {
            outcome.enter(RenderPhase::ShellError);
            return Err(RenderError::NoOutput);
        }
        Err(_) => {
            abort.abort();
            outcome.enter(RenderPhase::ShellError);
            return Err(RenderError::Timeout(budget));
        }
    };
    outcome.enter(RenderPhase::Streaming);
    tracing::debug!(writer = writer_id, "shell ready");

    let body = body_stream(Tail {
        shell: shell_markup,
        markup,
        resume,
        end: engine.document_end().to_string(),
        writer_id,
        deadline,
        abort,
        outcome: outcome.clone(),
    });

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = init.status_or_ok();
    response.headers_mut().extend(init.headers);
    response.headers_mut().insert(CONTENT_TYPE, HTML_CONTENT_TYPE);
    response.extensions_mut().insert(outcome);
    Ok(response)
}

struct Tail {
    shell: String,
    markup: MarkupStream,
    resume: Option<BoxStream<'static, String>>,
    end: String,
    writer_id: u64,
    deadline: Instant,
    abort: AbortHandle,
    outcome: RenderOutcome,
}

/// One item of the post-shell body, from either source.
enum Piece {
    Markup(Result<String, RenderError>),
    Chunk(String),
}

fn body_stream(tail: Tail) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let Tail {
        shell,
        markup,
        resume,
        end,
        writer_id,
        deadline,
        abort,
        outcome,
    } = tail;

    let has_resume = resume.is_some();
    let chunks = match resume {
        Some(resume) => resume.map(Piece::Chunk).boxed(),
        None => stream::empty().boxed(),
    };
    // Values that settle while the engine is still streaming are written
    // right away instead of waiting for the markup to finish.
    let mut pieces = stream::select(markup.map(Piece::Markup), chunks);

    async_stream::stream! {
        yield Ok::<_, Infallible>(Bytes::from(shell));

        let mut timed_out = false;
        loop {
            match timeout_at(deadline, pieces.next()).await {
                Ok(Some(Piece::Markup(Ok(chunk)))) => yield Ok(Bytes::from(chunk)),
                Ok(Some(Piece::Markup(Err(err)))) => {
                    tracing::error!(writer = writer_id, error = %err, "render failed after the shell");
                    outcome.fail();
                }
                Ok(Some(Piece::Chunk(chunk))) => {
                    yield Ok(Bytes::from(chunk_script(writer_id, &chunk)));
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        if has_resume {
            yield Ok(Bytes::from(close_script(writer_id)));
        }
        if !end.is_empty() {
            yield Ok(Bytes::from(end));
        }

        if timed_out {
            abort.abort();
            outcome.enter(RenderPhase::Aborted);
            tracing::warn!(writer = writer_id, "render aborted at the deadline");
        } else {
            outcome.enter(RenderPhase::Complete);
        }
        tracing::debug!(writer = writer_id, status = %outcome.status(), "render finished");
    }
}

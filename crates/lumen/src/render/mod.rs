//! Rendering seam and the streaming document pipeline.
//!
//! A [`RenderEngine`] turns a [`ViewTree`] into a stream of markup chunks.
//! The stream protocol maps onto the usual engine callbacks:
//!
//! * the first `Ok` item is the shell; yielding it is "shell ready",
//! * an `Err` before the shell fails the render, an `Err` after it is
//!   reported and the render carries on,
//! * the end of the stream is "all ready".
//!
//! [`render_document`] drives an engine, appends the resume scripts for
//! deferred loader data and enforces the wall-clock budget.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use futures::stream::BoxStream;
use maud::{html, Markup, DOCTYPE};
use thiserror::Error;
use tokio::sync::watch;

use crate::context::AppContext;
use crate::manifest::{ErrorCatcher, Manifest, Route};

mod maud_engine;
mod scripts;
mod stream;

pub use maud_engine::{MaudEngine, ViewProps};
pub use scripts::{
    bootstrap_script, chunk_script, close_script, embedded_chunks, embedded_shell, embedded_writer,
    DATA_SCRIPT_ID,
};
pub use stream::{render_document, RenderOutcome, RenderPhase};

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("no view registered under `{0}`")]
    MissingView(String),

    #[error("render did not produce a shell within {0:?}")]
    Timeout(Duration),

    #[error("engine finished without producing any markup")]
    NoOutput,

    #[error("{0}")]
    Engine(String),
}

pub type MarkupStream = BoxStream<'static, Result<String, RenderError>>;

/// What to render, innermost view wrapped by its layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTree {
    View {
        id: String,
        view: String,
    },
    Layout {
        id: String,
        view: String,
        child: Box<ViewTree>,
    },
    /// An error view; `None` selects the engine's default error view.
    Error { view: Option<String> },
}

impl ViewTree {
    /// Wraps the route's view with each of its layouts, innermost first, so
    /// the outermost layout ends up at the root.
    pub fn compose(manifest: &Manifest, route: &Route) -> Self {
        let layouts: Vec<_> = manifest.layouts_of(route).collect();
        let page = ViewTree::View {
            id: route.id().to_string(),
            view: route.view_key().to_string(),
        };
        layouts.into_iter().rev().fold(page, |child, layout| ViewTree::Layout {
            id: layout.id().to_string(),
            view: layout.view_key().to_string(),
            child: Box::new(child),
        })
    }

    pub fn error(catcher: Option<&ErrorCatcher>) -> Self {
        ViewTree::Error {
            view: catcher.map(|c| c.view_key().to_string()),
        }
    }
}

/// Lets an engine notice that the pipeline gave up on it.
#[derive(Debug, Clone)]
pub struct AbortSignal(watch::Receiver<bool>);

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the render is aborted or the pipeline is gone.
    pub async fn aborted(&mut self) {
        let _ = self.0.wait_for(|aborted| *aborted).await;
    }
}

pub(crate) struct AbortHandle(watch::Sender<bool>);

impl AbortHandle {
    pub(crate) fn abort(&self) {
        self.0.send_replace(true);
    }
}

pub(crate) fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle(tx), AbortSignal(rx))
}

/// Everything an engine needs for one document.
#[derive(Debug)]
pub struct RenderRequest {
    pub tree: ViewTree,
    pub context: AppContext,
    /// Codec shell of the context, to be embedded for the client.
    pub shell: String,
    pub has_resume: bool,
    /// Id of the client-side writer the resume scripts feed.
    pub writer_id: u64,
    pub abort: AbortSignal,
}

impl RenderRequest {
    pub fn url(&self) -> &str {
        self.context.url()
    }

    /// The script tags that hand the shell to the client runtime.
    pub fn bootstrap(&self) -> String {
        bootstrap_script(&self.shell, self.writer_id, self.has_resume)
    }
}

pub trait RenderEngine: Send + Sync + 'static {
    fn render_to_stream(&self, request: RenderRequest) -> MarkupStream;

    /// Markup written after the last resume script, closing the document.
    fn document_end(&self) -> &str {
        ""
    }
}

pub(crate) fn default_error_markup(status: u16, message: &str) -> Markup {
    html! {
        h1 { (status) " " (message) }
        p { a href="/" { "Go Home" } }
    }
}

/// Plain error document used when no error view could be rendered.
pub fn default_error_page(status: StatusCode, message: &str) -> Response {
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (status.as_u16()) " " (message) }
            }
            body { (default_error_markup(status.as_u16(), message)) }
        }
    };
    (status, Html(markup.into_string())).into_response()
}

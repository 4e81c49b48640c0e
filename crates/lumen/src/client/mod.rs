//! Client-side navigation.
//!
//! A [`Navigator`] owns the current [`AppContext`] and swaps it wholesale
//! after every navigation. Navigations fetch the target in data mode and
//! follow the server's markers:
//!
//! * `X-Route-Redirect` starts a fresh navigation to the given location,
//!   up to a fixed number of hops,
//! * `X-Route-Error` records an error that the next render re-raises,
//! * `X-Seria-Stream` carries the new context.
//!
//! State changes are published through a watch channel so views can
//! re-render on every change.

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::watch;
use url::Url;

use crate::codec::{encode_form, ByteStream, Codec, CodecError, NdjsonCodec};
use crate::config::Config;
use crate::context::AppContext;
use crate::headers::{FLAG, FORM_CONTENT_TYPE, X_LOADER_DATA, X_ROUTE_ERROR, X_ROUTE_REDIRECT, X_SERIA_STREAM, X_SERVER_ACTION};
use crate::render::{embedded_chunks, embedded_shell, embedded_writer};
use crate::value::Value;

mod history;
mod transport;

pub use history::{History, HistoryEntry, MemoryHistory};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("gave up after {limit} redirects")]
    TooManyRedirects { limit: usize },

    #[error("{status}: {message}")]
    Route { status: StatusCode, message: String },

    #[error("unexpected response status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid action id `{0}`")]
    InvalidAction(String),

    #[error("could not decode the response: {0}")]
    Decode(String),
}

impl From<CodecError> for NavigationError {
    fn from(err: CodecError) -> Self {
        NavigationError::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Loaded,
    Pending,
    Error,
}

/// What subscribers observe.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: NavigationState,
    pub context: Arc<AppContext>,
    pub error: Option<NavigationError>,
    pub url: Url,
}

#[derive(Debug, Clone, Copy)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing one.
    pub replace: bool,
    pub update_history: bool,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            replace: false,
            update_history: true,
        }
    }
}

impl NavigateOptions {
    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Self::default()
        }
    }
}

pub struct Navigator<T, H> {
    transport: T,
    history: H,
    codec: Arc<dyn Codec>,
    origin: Url,
    action_path: String,
    max_redirects: usize,
    state: watch::Sender<Snapshot>,
}

impl<T: Transport, H: History> Navigator<T, H> {
    pub fn new(transport: T, history: H, url: Url, context: AppContext) -> Self {
        let (state, _) = watch::channel(Snapshot {
            state: NavigationState::Loaded,
            context: Arc::new(context),
            error: None,
            url: url.clone(),
        });
        Self {
            transport,
            history,
            codec: Arc::new(NdjsonCodec),
            origin: url,
            action_path: "/_action".to_string(),
            max_redirects: crate::MAX_REDIRECTS,
            state,
        }
    }

    /// Starts from a server-rendered document: the embedded shell plus any
    /// resume chunks already written into it.
    ///
    /// Values still pending in the document are rejected once the chunks
    /// run out. Must be called within a tokio runtime.
    pub fn hydrate(transport: T, history: H, url: Url, html: &str) -> Result<Self, NavigationError> {
        let shell = embedded_shell(html)
            .ok_or_else(|| NavigationError::Decode("document carries no loader data".into()))?;
        let chunks = embedded_writer(html)
            .map(|writer| embedded_chunks(html, writer))
            .unwrap_or_default();
        let value = NdjsonCodec.decode_resumable(&shell, stream::iter(chunks).boxed())?;
        let context = AppContext::from_value(value)?;
        Ok(Self::new(transport, history, url, context))
    }

    pub fn with_codec(mut self, codec: impl Codec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_max_redirects(mut self, limit: usize) -> Self {
        self.max_redirects = limit;
        self
    }

    pub fn with_action_path(mut self, path: impl Into<String>) -> Self {
        self.action_path = path.into();
        self
    }

    /// Applies the `[navigation]` redirect limit and the `[actions]` path.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_max_redirects(config.navigation.max_redirects)
            .with_action_path(config.actions.path.clone())
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub fn state(&self) -> NavigationState {
        self.state.borrow().state
    }

    pub fn url(&self) -> Url {
        self.state.borrow().url.clone()
    }

    /// The context to render from. While the last navigation is in the
    /// error state this returns that error instead.
    pub fn context(&self) -> Result<Arc<AppContext>, NavigationError> {
        let snapshot = self.state.borrow();
        match (&snapshot.state, &snapshot.error) {
            (NavigationState::Error, Some(err)) => Err(err.clone()),
            _ => Ok(snapshot.context.clone()),
        }
    }

    /// Navigates to `href`, resolved against the current URL.
    pub async fn navigate(&self, href: &str, options: NavigateOptions) -> Result<(), NavigationError> {
        let target = self
            .url()
            .join(href)
            .map_err(|err| NavigationError::InvalidUrl(format!("{href}: {err}")))?;
        self.visit(target, options, 0).await
    }

    /// Reloads the current URL without touching history.
    pub async fn refresh(&self) -> Result<(), NavigationError> {
        let options = NavigateOptions {
            replace: true,
            update_history: false,
        };
        self.visit(self.url(), options, 0).await
    }

    /// Calls a server action, then refreshes so loaders see its effects.
    ///
    /// The action already ran once its result is decoded, so a failed
    /// refresh does not fail the call. It shows up in the navigation state.
    pub async fn call_action(&self, id: &str, args: &[JsonValue]) -> Result<Value, NavigationError> {
        let url = self
            .origin
            .join(&self.action_path)
            .map_err(|err| NavigationError::InvalidUrl(err.to_string()))?;
        let id_header =
            HeaderValue::from_str(id).map_err(|_| NavigationError::InvalidAction(id.to_string()))?;

        let mut request = TransportRequest {
            method: Method::POST,
            url,
            headers: Default::default(),
            body: Some(encode_form(args)),
        };
        request.headers.insert(X_SERVER_ACTION, id_header);
        request.headers.insert(CONTENT_TYPE, FORM_CONTENT_TYPE);

        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            tracing::warn!(action = %id, status = %response.status, "action failed");
            return Err(NavigationError::UnexpectedStatus(response.status));
        }
        let value = self.codec.decode(response.body).await?;
        if let Err(err) = self.refresh().await {
            tracing::warn!(action = %id, error = %err, "refresh after action failed");
        }
        Ok(value)
    }

    fn visit(&self, target: Url, options: NavigateOptions, hops: usize) -> BoxFuture<'_, Result<(), NavigationError>> {
        Box::pin(async move {
            if target.origin() != self.origin.origin() {
                tracing::debug!(url = %target, "leaving the app");
                self.history.assign(&target);
                return Ok(());
            }
            if hops >= self.max_redirects {
                return self.fail(NavigationError::TooManyRedirects {
                    limit: self.max_redirects,
                });
            }

            self.state.send_modify(|snapshot| {
                snapshot.state = NavigationState::Pending;
                snapshot.error = None;
            });

            let mut request = TransportRequest::get(target.clone());
            request.headers.insert(X_LOADER_DATA, FLAG);
            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(err) => return self.fail(err),
            };

            if let Some(location) = response.headers.get(X_ROUTE_REDIRECT) {
                let next = location
                    .to_str()
                    .map_err(|err| NavigationError::InvalidUrl(err.to_string()))
                    .and_then(|location| {
                        target
                            .join(location)
                            .map_err(|err| NavigationError::InvalidUrl(format!("{location}: {err}")))
                    });
                return match next {
                    Ok(next) => {
                        tracing::debug!(from = %target, to = %next, hop = hops + 1, "following redirect");
                        self.visit(next, options, hops + 1).await
                    }
                    Err(err) => self.fail(err),
                };
            }

            if response.headers.contains_key(X_ROUTE_ERROR) {
                let message = read_text(response.body).await;
                return self.fail(NavigationError::Route {
                    status: response.status,
                    message,
                });
            }

            if !response.headers.contains_key(X_SERIA_STREAM) {
                return self.fail(NavigationError::UnexpectedStatus(response.status));
            }

            let context = match self.decode_context(response.body).await {
                Ok(context) => context,
                Err(err) => return self.fail(err),
            };
            if options.update_history {
                if options.replace {
                    self.history.replace(&target);
                } else {
                    self.history.push(&target);
                }
            }
            self.state.send_replace(Snapshot {
                state: NavigationState::Loaded,
                context: Arc::new(context),
                error: None,
                url: target,
            });
            Ok(())
        })
    }

    async fn decode_context(&self, body: ByteStream) -> Result<AppContext, NavigationError> {
        let value = self.codec.decode(body).await?;
        Ok(AppContext::from_value(value)?)
    }

    fn fail(&self, err: NavigationError) -> Result<(), NavigationError> {
        tracing::debug!(error = %err, "navigation failed");
        self.state.send_modify(|snapshot| {
            snapshot.state = NavigationState::Error;
            snapshot.error = Some(err.clone());
        });
        Err(err)
    }
}

async fn read_text(body: ByteStream) -> String {
    let bytes = body
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

// File: src/server.rs
// Purpose: Axum wiring for page requests (document and data mode) and the action endpoint

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::StreamExt;
use tower_http::trace::TraceLayer;

use crate::action;
use crate::classify::{classify, Classified, Mode};
use crate::codec::{Codec, NdjsonCodec};
use crate::config::Config;
use crate::context::AppContext;
use crate::error::HttpError;
use crate::headers::{DATA_CONTENT_TYPE, FLAG, TEXT_CONTENT_TYPE, X_ROUTE_ERROR, X_SERIA_STREAM, X_SERVER_ACTION};
use crate::loader::{self, RequestInfo};
use crate::manifest::{Manifest, Route};
use crate::render::{default_error_page, render_document, RenderEngine, ViewTree};
use crate::response::ResponseInit;

/// Application state shared across handlers
#[derive(Clone)]
pub struct App {
    manifest: Arc<Manifest>,
    engine: Arc<dyn RenderEngine>,
    codec: Arc<dyn Codec>,
    config: Arc<Config>,
}

impl App {
    pub fn new(manifest: Arc<Manifest>, engine: impl RenderEngine) -> Self {
        Self {
            manifest,
            engine: Arc::new(engine),
            codec: Arc::new(NdjsonCodec),
            config: Arc::new(Config::default()),
        }
    }

    pub fn with_codec(mut self, codec: impl Codec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The action endpoint at the configured path, every other path served
    /// as a page.
    pub fn router(self) -> Router {
        let action_path = self.config.actions.path.clone();
        Router::new()
            .route(&action_path, post(action_handler))
            .fallback(page_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Serves one page request in `mode`.
    pub async fn handle_page(&self, mode: Mode, request: RequestInfo) -> Response {
        let path = request.uri.path().to_string();
        let url = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());

        let Some(hit) = self.manifest.routes().match_path(&path) else {
            tracing::debug!(%path, "no route matched");
            return self.error_response(mode, &path, &url, HttpError::not_found()).await;
        };
        let route = hit.entry;
        tracing::debug!(route = %route.id(), %path, ?mode, "route matched");

        let outcomes = match loader::resolve(&self.manifest, route, &hit.params, Arc::new(request)).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                tracing::error!(route = %route.id(), error = %err, "request failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        match classify(outcomes, &url, mode).await {
            Classified::Error(err) => self.error_response(mode, &path, &url, err).await,
            Classified::Redirect(response) | Classified::Passthrough(response) => response,
            Classified::Render { context, init } => match mode {
                Mode::Data => self.data_response(context, init),
                Mode::Document => self.document_response(route, context, init).await,
            },
        }
    }

    /// Streams the context as data. Values still pending at the render
    /// deadline are left unwritten and the stream ends, so the client
    /// rejects them.
    fn data_response(&self, context: AppContext, init: ResponseInit) -> Response {
        let budget = self.config.render.timeout();
        let deadline = async move {
            tokio::time::sleep(budget).await;
            tracing::warn!(?budget, "data stream cut off at the deadline");
        };
        let body = self.codec.encode(context.to_value()).take_until(deadline);
        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = init.status_or_ok();
        response.headers_mut().extend(init.headers);
        response.headers_mut().insert(CONTENT_TYPE, DATA_CONTENT_TYPE);
        response.headers_mut().insert(X_SERIA_STREAM, FLAG);
        response
    }

    async fn document_response(&self, route: &Route, context: AppContext, init: ResponseInit) -> Response {
        let tree = ViewTree::compose(&self.manifest, route);
        match render_document(
            self.engine.clone(),
            self.codec.as_ref(),
            tree,
            context,
            init,
            self.config.render.timeout(),
        )
        .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(route = %route.id(), error = %err, "document render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    async fn error_response(&self, mode: Mode, path: &str, url: &str, err: HttpError) -> Response {
        let status = err.status();
        if mode == Mode::Data {
            return (
                status,
                [(X_ROUTE_ERROR, FLAG), (CONTENT_TYPE, TEXT_CONTENT_TYPE)],
                err.public_message(),
            )
                .into_response();
        }

        let catcher = self.manifest.catchers().match_nearest(path).map(|hit| hit.entry);
        let init = ResponseInit {
            status: Some(status),
            ..ResponseInit::default()
        };
        match render_document(
            self.engine.clone(),
            self.codec.as_ref(),
            ViewTree::error(catcher),
            AppContext::for_error(url, err.info()),
            init,
            self.config.render.timeout(),
        )
        .await
        {
            Ok(response) => response,
            Err(render_err) => {
                tracing::error!(%status, error = %render_err, "error view failed, using the default page");
                default_error_page(status, &err.public_message())
            }
        }
    }
}

async fn page_handler(State(app): State<App>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    if parts.method != Method::GET && parts.method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let mode = Mode::from_headers(&parts.headers);
    app.handle_page(mode, RequestInfo::from_parts(&parts)).await
}

async fn action_handler(State(app): State<App>, headers: HeaderMap, body: Bytes) -> Response {
    let id = headers.get(X_SERVER_ACTION).and_then(|v| v.to_str().ok());
    action::dispatch(&app.manifest, app.codec.as_ref(), id, &body)
        .await
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ErrorCatcher;
    use crate::render::MaudEngine;
    use crate::error::Error;
    use crate::response::not_found;
    use crate::value::{Deferred, Value};
    use axum::http::{Request as HttpRequest, Uri};
    use futures::stream;
    use std::time::Duration;
    use maud::html;
    use tower::ServiceExt;

    fn app() -> App {
        let mut builder = Manifest::builder();
        builder
            .route(Route::new("home", "/").loader(|_| async { Ok::<_, Error>(Value::from("hi")) }))
            .route(Route::new("gone", "/gone").loader(|_| async { Err::<(), _>(not_found()) }))
            .catcher(ErrorCatcher::new("root-error", "/*rest?"));
        let engine = MaudEngine::new("test")
            .page("home", |props| html! { p { (props.data().and_then(|v| v.as_str()).unwrap_or("")) } })
            .error_view("root-error", |ctx| {
                html! { h1.error { (ctx.error().map(|e| e.status).unwrap_or(500)) } }
            });
        App::new(Arc::new(builder.build().unwrap()), engine)
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn document_request_renders_html() {
        let response = app()
            .router()
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = text(response).await;
        assert!(html.contains("<p>hi</p>"));
        assert!(html.ends_with("</body></html>"));
    }

    #[tokio::test]
    async fn data_streams_close_at_the_render_deadline() {
        let never = Deferred::pending();
        let held = never.clone();
        let mut builder = Manifest::builder();
        builder.route(Route::new("slow", "/slow").loader(move |_| {
            let value = held.clone();
            async move { Ok::<_, Error>(value) }
        }));
        let mut config = Config::default();
        config.render.timeout_ms = 50;
        let app = App::new(Arc::new(builder.build().unwrap()), MaudEngine::new("test")).with_config(config);

        let response = app
            .handle_page(Mode::Data, RequestInfo::get(Uri::from_static("/slow")))
            .await;
        assert_eq!(response.headers()[X_SERIA_STREAM], "1");
        let body = tokio::time::timeout(Duration::from_secs(2), text(response))
            .await
            .expect("data stream should end at the deadline");

        let value = NdjsonCodec
            .decode(stream::iter(vec![Ok(Bytes::from(body))]).boxed())
            .await
            .unwrap();
        assert!(value.into_json().await.is_err());
        assert!(never.is_pending());
    }

    #[tokio::test]
    async fn domain_error_renders_the_catcher() {
        let response = app()
            .handle_page(Mode::Document, RequestInfo::get(Uri::from_static("/gone")))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(text(response).await.contains(r#"<h1 class="error">404</h1>"#));
    }

    #[tokio::test]
    async fn unmatched_data_request_is_a_tagged_404() {
        let response = app()
            .handle_page(Mode::Data, RequestInfo::get(Uri::from_static("/missing")))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[X_ROUTE_ERROR], "1");
        assert_eq!(text(response).await, "Not Found");
    }

    #[tokio::test]
    async fn actions_require_post() {
        let response = app()
            .router()
            .oneshot(HttpRequest::get("/_action").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

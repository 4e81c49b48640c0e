//! Shared fixture: a small app served in-process, plus a transport that
//! drives it without a socket.
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures::{StreamExt, TryStreamExt};
use lumen::client::{MemoryHistory, NavigationError, Navigator, Transport, TransportRequest, TransportResponse};
use lumen::codec::CodecError;
use lumen::response::LoaderOutput;
use lumen::{
    html, json, not_found, redirect, App, AppContext, Deferred, Error, ErrorCatcher, Layout, LoaderArgs, Manifest,
    MaudEngine, Route, ServerAction, Value,
};
use serde_json::json as j;
use tower::ServiceExt;
use url::Url;

pub const ORIGIN: &str = "http://app.test/";

pub struct Fixture {
    pub router: axum::Router,
    pub counter: Arc<AtomicI64>,
}

pub fn manifest(counter: Arc<AtomicI64>) -> Manifest {
    let mut builder = Manifest::builder();
    let root = builder.layout(Layout::new("root", "/").loader(|_| async { Ok::<_, Error>(j!({ "user": "ada" })) }));
    let guard = builder.layout(Layout::new("guard", "/secret").loader(|_| async { Err::<(), _>(not_found()) }));

    let read_counter = counter.clone();
    let bump_counter = counter;

    builder
        .route(Route::new("home", "/").layouts([root]).loader(|_| async { Ok::<_, Error>(j!("welcome")) }))
        .route(Route::new("todos", "/todos").layouts([root]).loader(|_| async {
            let later = Deferred::spawn(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Value::from(42))
            });
            Ok::<_, Error>(Value::object([
                ("items", Value::from(j!([{ "id": 1, "title": "write tests" }]))),
                ("later", later.into()),
            ]))
        }))
        .route(
            Route::new("todo", "/todos/:id")
                .layouts([root])
                .loader(|args: LoaderArgs| async move {
                    match args.params.get_str("id") {
                        Some("1") => Ok(json(j!({ "id": 1 }))),
                        _ => Err(not_found()),
                    }
                }),
        )
        .route(Route::new("secret", "/secret").layouts([root, guard]).loader(|_| async {
            Ok::<_, Error>(j!("classified"))
        }))
        .route(Route::new("hop", "/hop/:n").loader(|args: LoaderArgs| async move {
            let n: u32 = args.params.get_str("n").and_then(|n| n.parse().ok()).unwrap_or(0);
            let output: LoaderOutput = if n == 0 {
                j!("landed").into()
            } else {
                redirect(&format!("/hop/{}", n - 1)).into()
            };
            Ok::<_, Error>(output)
        }))
        .route(Route::new("away", "/away").loader(|_| async {
            Ok::<_, Error>(redirect("http://elsewhere.test/x"))
        }))
        .route(Route::new("boom", "/boom").loader(|_| async {
            Err::<(), _>(anyhow::anyhow!("database unreachable"))
        }))
        .route(Route::new("counter", "/counter").loader(move |_| {
            let counter = read_counter.clone();
            async move { Ok::<_, Error>(j!(counter.load(Ordering::SeqCst))) }
        }))
        .catcher(ErrorCatcher::new("root-error", "/*rest?"))
        .action(ServerAction::new("actions#add", |args: Vec<Value>| async move {
            Ok::<_, Error>(Value::from(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        }))
        .action(ServerAction::new("actions#fail", |_| async {
            Err::<Value, _>(anyhow::anyhow!("disk full"))
        }))
        .action(ServerAction::new("counter#bump", move |args: Vec<Value>| {
            let counter = bump_counter.clone();
            async move {
                let by = args.first().and_then(Value::as_i64).unwrap_or(1);
                Ok::<_, Error>(Value::from(counter.fetch_add(by, Ordering::SeqCst) + by))
            }
        }));
    builder.build().expect("fixture manifest is valid")
}

pub fn engine() -> MaudEngine {
    let mut engine = MaudEngine::new("fixture").layout("root", |_, inner| html! { div.root { (inner) } });
    for page in ["home", "todos", "todo", "secret", "hop", "counter"] {
        engine = engine.page(page, |props| html! { pre.page { (format!("{:?}", props.data())) } });
    }
    engine.error_view("root-error", |context: &AppContext| {
        let status = context.error().map(|e| e.status).unwrap_or(500);
        html! { h1.error { "error " (status) } }
    })
}

pub fn fixture() -> Fixture {
    let counter = Arc::new(AtomicI64::new(0));
    let app = App::new(Arc::new(manifest(counter.clone())), engine());
    Fixture {
        router: app.router(),
        counter,
    }
}

pub async fn send(router: &axum::Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("router is infallible")
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    String::from_utf8(bytes.to_vec()).expect("body is utf-8")
}

/// Serves navigator requests straight from an axum router.
#[derive(Clone)]
pub struct RouterTransport {
    router: axum::Router,
}

impl RouterTransport {
    pub fn new(router: axum::Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, NavigationError> {
        let path_and_query = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };
        let mut builder = Request::builder().method(request.method).uri(path_and_query);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let http_request = builder
            .body(request.body.map(Body::from).unwrap_or_else(Body::empty))
            .map_err(|err| NavigationError::Transport(err.to_string()))?;

        let response = send(&self.router, http_request).await;
        let status: StatusCode = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .into_data_stream()
            .map_err(|err| CodecError::Transport(err.to_string()))
            .boxed();
        Ok(TransportResponse { status, headers, body })
    }
}

pub fn navigator(router: axum::Router) -> Navigator<RouterTransport, MemoryHistory> {
    let origin = Url::parse(ORIGIN).expect("origin is a valid url");
    Navigator::new(RouterTransport::new(router), MemoryHistory::new(), origin, AppContext::default())
}

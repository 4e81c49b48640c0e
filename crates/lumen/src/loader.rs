// File: src/loader.rs
// Purpose: Run a route's loader and its layouts' loaders concurrently and collect every outcome

use std::sync::Arc;
use std::time::Instant;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use futures::future::{self, BoxFuture};
use lumen_router::Params;

use crate::error::{Error, HttpError, Result};
use crate::manifest::{LoaderFn, Manifest, Route};
use crate::response::{LoaderOutput, TypedResponse};
use crate::value::Value;

/// The parts of the incoming request a loader may inspect.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    /// A bare GET for `uri`; handy outside of a live request.
    pub fn get(uri: Uri) -> Self {
        Self {
            method: Method::GET,
            uri,
            headers: HeaderMap::new(),
        }
    }

    /// First value of a query parameter, percent-decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then(|| {
                urlencoding::decode(&v.replace('+', " "))
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| v.to_string())
            })
        })
    }
}

/// Arguments handed to every loader of a request.
#[derive(Debug, Clone)]
pub struct LoaderArgs {
    pub params: Params,
    pub request: Arc<RequestInfo>,
}

/// How one loader settled.
#[derive(Debug)]
pub enum Outcome {
    Value(Value),
    Typed(TypedResponse),
    DomainError(HttpError),
    Platform(Response),
}

impl Outcome {
    pub fn is_domain_error(&self) -> bool {
        matches!(self, Outcome::DomainError(_))
    }
}

impl From<LoaderOutput> for Outcome {
    fn from(output: LoaderOutput) -> Self {
        match output {
            LoaderOutput::Value(value) => Outcome::Value(value),
            LoaderOutput::Typed(typed) => Outcome::Typed(typed),
            LoaderOutput::Response(response) => Outcome::Platform(response),
        }
    }
}

/// One outcome per route and layout id: the route first, then its layouts
/// outermost to innermost.
#[derive(Debug, Default)]
pub struct Outcomes {
    entries: Vec<(String, Outcome)>,
}

impl Outcomes {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Outcome> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_entries(self) -> Vec<(String, Outcome)> {
        self.entries
    }
}

fn run(
    id: String,
    loader: Option<LoaderFn>,
    args: LoaderArgs,
) -> BoxFuture<'static, (String, Result<LoaderOutput>)> {
    Box::pin(async move {
        let Some(loader) = loader else {
            return (id, Ok(LoaderOutput::Value(Value::Undefined)));
        };
        let started = Instant::now();
        let result = loader(args).await;
        tracing::debug!(
            loader = %id,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loader settled"
        );
        (id, result)
    })
}

impl FromIterator<(String, Outcome)> for Outcomes {
    fn from_iter<I: IntoIterator<Item = (String, Outcome)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Runs every loader that applies to `route` and waits for all of them.
///
/// Domain errors are captured per id. Any other error fails the whole
/// resolution, but only after every loader has settled; when several
/// loaders fail that way the first in map order is returned, which in
/// practice depends on which loaders were slow enough to fail at all.
pub async fn resolve(
    manifest: &Manifest,
    route: &Route,
    params: &Params,
    request: Arc<RequestInfo>,
) -> Result<Outcomes> {
    let args = LoaderArgs {
        params: params.clone(),
        request,
    };

    let tasks = std::iter::once((route.id(), route.loader_fn()))
        .chain(manifest.layouts_of(route).map(|l| (l.id(), l.loader_fn())))
        .map(|(id, loader)| run(id.to_string(), loader.cloned(), args.clone()));

    let settled = future::join_all(tasks).await;

    let mut outcomes = Outcomes::default();
    let mut fatal: Option<(String, Error)> = None;
    for (id, result) in settled {
        match result {
            Ok(output) => outcomes.entries.push((id, output.into())),
            Err(Error::Http(err)) => outcomes.entries.push((id, Outcome::DomainError(err))),
            Err(err) => {
                if fatal.is_none() {
                    fatal = Some((id, err));
                } else {
                    tracing::error!(loader = %id, error = %err, "loader failed");
                }
            }
        }
    }

    if let Some((id, err)) = fatal {
        tracing::error!(loader = %id, error = %err, "loader failed, aborting request");
        return Err(err);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Layout;
    use crate::response::{json, not_found};
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json as j;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn request() -> Arc<RequestInfo> {
        Arc::new(RequestInfo::get(Uri::from_static("/x?q=a+b")))
    }

    #[test]
    fn query_values_are_decoded() {
        assert_eq!(request().query("q").as_deref(), Some("a b"));
        assert_eq!(request().query("missing"), None);
    }

    #[tokio::test]
    async fn one_entry_per_route_and_layout_even_without_loaders() {
        let mut builder = Manifest::builder();
        let outer = builder.layout(Layout::new("outer", "/"));
        let inner = builder.layout(Layout::new("inner", "/x").loader(|_| async { Ok::<_, Error>(j!(1)) }));
        builder.route(Route::new("page", "/x").layouts([outer, inner]));
        let manifest = builder.build().unwrap();
        let hit = manifest.routes().match_path("/x").unwrap();

        let outcomes = resolve(&manifest, hit.entry, &hit.params, request()).await.unwrap();
        let ids: Vec<_> = outcomes.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["page", "outer", "inner"]);
        assert!(matches!(outcomes.get("page"), Some(Outcome::Value(Value::Undefined))));
        assert!(matches!(outcomes.get("outer"), Some(Outcome::Value(Value::Undefined))));
    }

    #[tokio::test]
    async fn domain_errors_are_captured_per_id() {
        let mut builder = Manifest::builder();
        let a = builder.layout(Layout::new("a", "/").loader(|_| async { Err::<(), _>(not_found()) }));
        let b = builder.layout(Layout::new("b", "/").loader(|_| async {
            Ok::<_, Error>(json(2).status(StatusCode::CREATED))
        }));
        let c = builder.layout(Layout::new("c", "/").loader(|_| async {
            Err::<(), _>(HttpError::new(StatusCode::FORBIDDEN, "no"))
        }));
        builder.route(Route::new("page", "/").layouts([a, b, c]).loader(|_| async { Ok::<_, Error>(j!("ok")) }));
        let manifest = builder.build().unwrap();
        let hit = manifest.routes().match_path("/").unwrap();

        let outcomes = resolve(&manifest, hit.entry, &hit.params, request()).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|(_, o)| o.is_domain_error()).count(), 2);
    }

    #[tokio::test]
    async fn fatal_error_waits_for_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();

        let mut builder = Manifest::builder();
        let slow = builder.layout(Layout::new("slow", "/").loader(move |_| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(j!(null))
            }
        }));
        builder.route(
            Route::new("page", "/")
                .layouts([slow])
                .loader(|_| async { Err::<(), _>(anyhow::anyhow!("db down")) }),
        );
        let manifest = builder.build().unwrap();
        let hit = manifest.routes().match_path("/").unwrap();

        let err = resolve(&manifest, hit.entry, &hit.params, request()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loaders_run_concurrently() {
        let mut builder = Manifest::builder();
        let mut layouts = Vec::new();
        for id in ["a", "b", "c"] {
            layouts.push(builder.layout(Layout::new(id, "/").loader(|_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, Error>(())
            })));
        }
        builder.route(Route::new("page", "/").layouts(layouts));
        let manifest = builder.build().unwrap();
        let hit = manifest.routes().match_path("/").unwrap();

        let started = Instant::now();
        resolve(&manifest, hit.entry, &hit.params, request()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(140));
    }
}

// File: src/response.rs
// Purpose: What loaders may return: plain values, typed JSON, redirects and raw responses

use axum::body::Body;
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value as JsonValue;

use crate::error::{Error, HttpError};
use crate::headers::X_ROUTE_REDIRECT;
use crate::value::{Deferred, Value};

/// Status and headers declared alongside a typed JSON result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseInit {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
}

impl ResponseInit {
    /// Overlays `other` onto `self`: its status (if any) replaces ours and
    /// its headers replace ours name by name.
    pub fn merge(&mut self, other: ResponseInit) {
        if other.status.is_some() {
            self.status = other.status;
        }
        let mut last: Option<HeaderName> = None;
        for (name, value) in other.headers {
            match name {
                Some(name) => {
                    self.headers.insert(name.clone(), value);
                    last = Some(name);
                }
                None => {
                    if let Some(name) = &last {
                        self.headers.append(name.clone(), value);
                    }
                }
            }
        }
    }

    pub fn status_or_ok(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

/// A value plus the response init it should be served with.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedResponse {
    pub value: Value,
    pub init: ResponseInit,
}

impl TypedResponse {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.init.status = Some(status);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.init.headers.insert(name, value);
        self
    }
}

/// Wraps a value so that a status or headers can be attached to it.
pub fn json(value: impl Into<Value>) -> TypedResponse {
    TypedResponse {
        value: value.into(),
        init: ResponseInit::default(),
    }
}

/// A 302 redirect that the client router will follow.
pub fn redirect(location: &str) -> Response {
    redirect_with(location, StatusCode::FOUND)
}

/// A redirect with an explicit 3xx status.
pub fn redirect_with(location: &str, status: StatusCode) -> Response {
    let built = Response::builder()
        .status(status)
        .header(LOCATION, location)
        .header(X_ROUTE_REDIRECT, location)
        .body(Body::empty());
    match built {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(%location, error = %err, "invalid redirect");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The error a loader returns when the thing it was asked for does not exist.
pub fn not_found() -> Error {
    Error::Http(HttpError::not_found())
}

/// Everything a loader can hand back.
#[derive(Debug)]
pub enum LoaderOutput {
    Value(Value),
    Typed(TypedResponse),
    /// A raw response; the loader takes over the reply.
    Response(Response),
}

impl From<Value> for LoaderOutput {
    fn from(value: Value) -> Self {
        LoaderOutput::Value(value)
    }
}

impl From<JsonValue> for LoaderOutput {
    fn from(json: JsonValue) -> Self {
        LoaderOutput::Value(Value::Json(json))
    }
}

impl From<Deferred> for LoaderOutput {
    fn from(deferred: Deferred) -> Self {
        LoaderOutput::Value(Value::Deferred(deferred))
    }
}

impl From<TypedResponse> for LoaderOutput {
    fn from(typed: TypedResponse) -> Self {
        LoaderOutput::Typed(typed)
    }
}

impl From<Response> for LoaderOutput {
    fn from(response: Response) -> Self {
        LoaderOutput::Response(response)
    }
}

impl From<()> for LoaderOutput {
    fn from(_: ()) -> Self {
        LoaderOutput::Value(Value::Undefined)
    }
}

//! Header names and content types shared by the server and the client.

use axum::http::{HeaderName, HeaderValue};

/// Request header selecting the data-only mode.
pub const X_LOADER_DATA: HeaderName = HeaderName::from_static("x-loader-data");

/// Marks a successful data-only or action response as a codec stream.
pub const X_SERIA_STREAM: HeaderName = HeaderName::from_static("x-seria-stream");

/// Carries a redirect destination the client should navigate to.
pub const X_ROUTE_REDIRECT: HeaderName = HeaderName::from_static("x-route-redirect");

/// Marks a data-only response as an error body.
pub const X_ROUTE_ERROR: HeaderName = HeaderName::from_static("x-route-error");

/// Names the server action being invoked.
pub const X_SERVER_ACTION: HeaderName = HeaderName::from_static("x-server-action");

pub const FLAG: HeaderValue = HeaderValue::from_static("1");

pub const DATA_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("application/x-ndjson");
pub const ACTION_CONTENT_TYPE: HeaderValue =
    HeaderValue::from_static("application/x-lumen-action+ndjson");
pub const HTML_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
pub const TEXT_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
pub const FORM_CONTENT_TYPE: HeaderValue =
    HeaderValue::from_static("application/x-www-form-urlencoded");

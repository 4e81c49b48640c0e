// File: src/action.rs
// Purpose: Invoke server actions by id and stream their results back

use std::panic::AssertUnwindSafe;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use crate::codec::{ByteStream, Codec};
use crate::headers::{ACTION_CONTENT_TYPE, FLAG, X_SERIA_STREAM};
use crate::manifest::{action_path, Manifest};

/// Result of dispatching one action call.
pub enum ActionResult {
    /// Codec stream of the returned value.
    Stream(ByteStream),
    /// No action under the requested id. The body stays empty.
    NotFound,
    /// Decoding the arguments or running the action failed. Details only go
    /// to the log.
    Failed,
}

impl IntoResponse for ActionResult {
    fn into_response(self) -> Response {
        match self {
            ActionResult::Stream(stream) => {
                let mut response = Response::new(Body::from_stream(stream));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, ACTION_CONTENT_TYPE);
                response.headers_mut().insert(X_SERIA_STREAM, FLAG);
                response
            }
            ActionResult::NotFound => StatusCode::NOT_FOUND.into_response(),
            ActionResult::Failed => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Looks up `action_id`, decodes the positional arguments in `body` and
/// runs the action.
///
/// A panicking action is treated like one that returned an error.
pub async fn dispatch(
    manifest: &Manifest,
    codec: &dyn Codec,
    action_id: Option<&str>,
    body: &[u8],
) -> ActionResult {
    let Some(id) = action_id else {
        tracing::debug!("action request without an action id");
        return ActionResult::NotFound;
    };
    let Some(hit) = manifest.actions().match_path(&action_path(id)) else {
        tracing::debug!(action = %id, "unknown action");
        return ActionResult::NotFound;
    };
    let action = hit.entry;

    let args = match codec.decode_form(body) {
        Ok(args) => args,
        Err(err) => {
            tracing::error!(action = %action.id(), error = %err, "could not decode action arguments");
            return ActionResult::Failed;
        }
    };

    tracing::debug!(action = %action.id(), args = args.len(), "invoking action");
    match AssertUnwindSafe(action.invoke(args)).catch_unwind().await {
        Ok(Ok(value)) => ActionResult::Stream(codec.encode(value)),
        Ok(Err(err)) => {
            tracing::error!(action = %action.id(), error = %err, "action failed");
            ActionResult::Failed
        }
        Err(_) => {
            tracing::error!(action = %action.id(), "action panicked");
            ActionResult::Failed
        }
    }
}

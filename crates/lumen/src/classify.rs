// File: src/classify.rs
// Purpose: Decide what a request yields from its loader outcomes

use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::context::{AppContext, LoaderData};
use crate::error::HttpError;
use crate::headers::{X_LOADER_DATA, X_ROUTE_REDIRECT};
use crate::loader::{Outcome, Outcomes};
use crate::response::ResponseInit;

/// Upper bound on an error body read for its message.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// How the client asked for the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full HTML document.
    Document,
    /// Codec stream of the app context only.
    Data,
}

impl Mode {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if headers.contains_key(X_LOADER_DATA) {
            Mode::Data
        } else {
            Mode::Document
        }
    }
}

#[derive(Debug)]
pub enum Classified {
    /// Render the error view (document) or a tagged error body (data).
    Error(HttpError),
    /// Already adapted to the request mode.
    Redirect(Response),
    /// A loader took over the response.
    Passthrough(Response),
    Render {
        context: AppContext,
        init: ResponseInit,
    },
}

enum Signal {
    Error(HttpError),
    ErrorResponse(Response),
    Redirect(Response),
    Passthrough(Response),
}

impl Signal {
    fn priority(&self) -> u8 {
        match self {
            Signal::Error(_) => 0,
            Signal::ErrorResponse(_) => 1,
            Signal::Redirect(_) => 2,
            Signal::Passthrough(_) => 3,
        }
    }
}

fn signal_for(response: Response) -> Signal {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        Signal::ErrorResponse(response)
    } else if status.is_redirection() && response.headers().contains_key(X_ROUTE_REDIRECT) {
        Signal::Redirect(response)
    } else {
        Signal::Passthrough(response)
    }
}

/// Applies the outcome priorities: domain errors, then error responses,
/// then marked redirects, then any other raw response. Within one class the
/// first entry in map order wins. With no signal at all the values are
/// gathered into an [`AppContext`] and typed inits are merged in order.
pub async fn classify(outcomes: Outcomes, url: &str, mode: Mode) -> Classified {
    let mut signal: Option<Signal> = None;
    let mut data = LoaderData::new();
    let mut init = ResponseInit::default();

    for (id, outcome) in outcomes.into_entries() {
        let next = match outcome {
            Outcome::Value(value) => {
                data.insert(id, value);
                continue;
            }
            Outcome::Typed(typed) => {
                init.merge(typed.init);
                data.insert(id, typed.value);
                continue;
            }
            Outcome::DomainError(err) => Signal::Error(err),
            Outcome::Platform(response) => signal_for(response),
        };
        if signal
            .as_ref()
            .map_or(true, |current| next.priority() < current.priority())
        {
            signal = Some(next);
        }
    }

    match signal {
        Some(Signal::Error(err)) => Classified::Error(err),
        Some(Signal::ErrorResponse(response)) => Classified::Error(error_from_response(response).await),
        Some(Signal::Redirect(response)) => Classified::Redirect(match mode {
            Mode::Document => response,
            Mode::Data => into_data_redirect(response),
        }),
        Some(Signal::Passthrough(response)) => Classified::Passthrough(response),
        None => Classified::Render {
            context: AppContext::new(url, data),
            init,
        },
    }
}

async fn error_from_response(response: Response) -> HttpError {
    let status = response.status();
    let is_text = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/plain"));
    if !is_text {
        return HttpError::from_status(status);
    }

    match axum::body::to_bytes(response.into_body(), ERROR_BODY_LIMIT).await {
        Ok(body) => {
            let message = String::from_utf8_lossy(&body).trim().to_string();
            if message.is_empty() {
                HttpError::from_status(status)
            } else {
                HttpError::new(status, message)
            }
        }
        Err(err) => {
            tracing::warn!(%status, error = %err, "could not read error body");
            HttpError::from_status(status)
        }
    }
}

/// Swaps `Location` for the redirect marker so the client navigates
/// instead of the HTTP stack following the redirect.
fn into_data_redirect(mut response: Response) -> Response {
    let destination = response
        .headers_mut()
        .remove(LOCATION)
        .or_else(|| response.headers().get(X_ROUTE_REDIRECT).cloned());
    if let Some(destination) = destination {
        response.headers_mut().insert(X_ROUTE_REDIRECT, destination);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{json, redirect};
    use crate::value::Value;
    use axum::body::Body;
    use axum::http::header::CACHE_CONTROL;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use pretty_assertions::assert_eq;

    fn outcomes(entries: Vec<(&str, Outcome)>) -> Outcomes {
        entries
            .into_iter()
            .map(|(id, outcome)| (id.to_string(), outcome))
            .collect()
    }

    #[tokio::test]
    async fn a_failing_layout_beats_a_successful_route() {
        let result = classify(
            outcomes(vec![
                ("page", Outcome::Value(Value::from(1))),
                ("layout", Outcome::DomainError(HttpError::not_found())),
            ]),
            "/",
            Mode::Document,
        )
        .await;
        assert!(matches!(result, Classified::Error(e) if e.status() == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn errors_outrank_earlier_redirects() {
        let result = classify(
            outcomes(vec![
                ("page", Outcome::Platform(redirect("/login"))),
                ("layout", Outcome::DomainError(HttpError::from_status(StatusCode::FORBIDDEN))),
            ]),
            "/",
            Mode::Data,
        )
        .await;
        assert!(matches!(result, Classified::Error(e) if e.status() == StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn first_error_in_map_order_wins() {
        let result = classify(
            outcomes(vec![
                ("page", Outcome::DomainError(HttpError::from_status(StatusCode::GONE))),
                ("layout", Outcome::DomainError(HttpError::not_found())),
            ]),
            "/",
            Mode::Data,
        )
        .await;
        assert!(matches!(result, Classified::Error(e) if e.status() == StatusCode::GONE));
    }

    #[tokio::test]
    async fn text_error_responses_carry_their_message() {
        let text = (StatusCode::UNAUTHORIZED, "sign in first").into_response();
        let result = classify(outcomes(vec![("page", Outcome::Platform(text))]), "/", Mode::Data).await;
        let Classified::Error(err) = result else {
            panic!("expected an error");
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), Some("sign in first"));

        let json_body = Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{\"e\":1}"))
            .unwrap();
        let result = classify(outcomes(vec![("page", Outcome::Platform(json_body))]), "/", Mode::Data).await;
        assert!(matches!(result, Classified::Error(e) if e.message().is_none()));
    }

    #[tokio::test]
    async fn data_redirects_swap_location_for_the_marker() {
        let result = classify(outcomes(vec![("page", Outcome::Platform(redirect("/todos")))]), "/", Mode::Data).await;
        let Classified::Redirect(response) = result else {
            panic!("expected a redirect");
        };
        assert!(response.headers().get(LOCATION).is_none());
        assert_eq!(response.headers()[X_ROUTE_REDIRECT], "/todos");
    }

    #[tokio::test]
    async fn document_redirects_pass_unmodified() {
        let result = classify(
            outcomes(vec![("page", Outcome::Platform(redirect("/todos")))]),
            "/",
            Mode::Document,
        )
        .await;
        let Classified::Redirect(response) = result else {
            panic!("expected a redirect");
        };
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/todos");
    }

    #[tokio::test]
    async fn unmarked_responses_pass_through() {
        let plain_redirect = Response::builder()
            .status(StatusCode::MOVED_PERMANENTLY)
            .header(LOCATION, "/elsewhere")
            .body(Body::empty())
            .unwrap();
        let result = classify(
            outcomes(vec![("page", Outcome::Platform(plain_redirect))]),
            "/",
            Mode::Data,
        )
        .await;
        assert!(matches!(result, Classified::Passthrough(r) if r.status() == StatusCode::MOVED_PERMANENTLY));
    }

    #[tokio::test]
    async fn typed_results_merge_their_inits() {
        let first = json(1)
            .status(StatusCode::CREATED)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        let second = json(2).header(CACHE_CONTROL, HeaderValue::from_static("private"));
        let result = classify(
            outcomes(vec![
                ("page", Outcome::Typed(first)),
                ("layout", Outcome::Typed(second)),
                ("plain", Outcome::Value(Value::Undefined)),
            ]),
            "/x?y=1",
            Mode::Document,
        )
        .await;
        let Classified::Render { context, init } = result else {
            panic!("expected a render");
        };
        assert_eq!(init.status, Some(StatusCode::CREATED));
        assert_eq!(init.headers[CACHE_CONTROL], "private");
        assert_eq!(context.url(), "/x?y=1");
        assert_eq!(context.loader_data().ids().collect::<Vec<_>>(), vec!["page", "layout", "plain"]);
        assert_eq!(context.data("layout"), Some(&Value::from(2)));
    }
}

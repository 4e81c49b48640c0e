// File: src/error.rs
// Purpose: Domain errors raised by loaders and the crate-wide error type

use axum::http::StatusCode;
use thiserror::Error;

use crate::codec::CodecError;
use crate::context::ErrorInfo;
use crate::manifest::ManifestError;
use crate::render::RenderError;

/// An application-raised error carrying an HTTP status in `400..=599`.
///
/// Returning one from a loader is recoverable: the request renders the
/// nearest error catcher (or a tagged error body for data requests)
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}{}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct HttpError {
    status: StatusCode,
    message: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: error_status(status),
            message: Some(message.into()),
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status: error_status(status),
            message: None,
        }
    }

    pub fn not_found() -> Self {
        Self::from_status(StatusCode::NOT_FOUND)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Message shown to the client: the explicit one, else the reason phrase.
    pub fn public_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.status.canonical_reason().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            status: self.status.as_u16(),
            message: self.message.clone(),
        }
    }
}

fn error_status(status: StatusCode) -> StatusCode {
    if status.is_client_error() || status.is_server_error() {
        status
    } else {
        tracing::warn!(%status, "domain error raised with a non-error status, using 500");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// Anything else raised by application code. Never shown to clients.
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<HttpError>() {
            Ok(http) => Error::Http(http),
            Err(err) => Error::Internal(err),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_the_message_when_present() {
        assert_eq!(HttpError::not_found().to_string(), "404 Not Found");
        assert_eq!(
            HttpError::new(StatusCode::FORBIDDEN, "private docs").to_string(),
            "403 Forbidden: private docs"
        );
    }

    #[test]
    fn non_error_status_is_coerced() {
        assert_eq!(
            HttpError::from_status(StatusCode::OK).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(HttpError::not_found().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn anyhow_wrapping_a_domain_error_stays_a_domain_error() {
        let err: Error = anyhow::Error::new(HttpError::new(StatusCode::FORBIDDEN, "nope")).into();
        assert!(matches!(err, Error::Http(ref e) if e.status() == StatusCode::FORBIDDEN));

        let err: Error = anyhow::anyhow!("db down").into();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn public_message_falls_back_to_reason() {
        assert_eq!(HttpError::not_found().public_message(), "Not Found");
        assert_eq!(
            HttpError::new(StatusCode::GONE, "moved on").public_message(),
            "moved on"
        );
    }
}

use thiserror::Error;

/// Failures raised while building a [`Router`](crate::Router).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("pattern `{pattern}` duplicates already registered `{existing}`")]
    DuplicatePattern { pattern: String, existing: String },
}

impl RouterError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

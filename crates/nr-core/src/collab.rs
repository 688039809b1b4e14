//! Failure taxonomy for calls against the model and store collaborators.

use thiserror::Error;

pub type CollabResult<T> = Result<T, CollabError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollabError {
    /// Collaborator could not be reached.
    #[error("{what} unavailable: {message}")]
    Unavailable { what: String, message: String },

    /// Call did not complete within its deadline.
    #[error("{what} timed out after {after_ms} ms")]
    Timeout { what: String, after_ms: u64 },

    /// Collaborator refused the request; retrying will not help.
    #[error("{what} rejected: {message}")]
    Rejected { what: String, message: String },
}

impl CollabError {
    pub fn unavailable(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn rejected(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Unavailable and Timeout are transient; Rejected is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CollabError::unavailable("model", "closed").is_retryable());
        assert!(
            CollabError::Timeout {
                what: "store".into(),
                after_ms: 10
            }
            .is_retryable()
        );
        assert!(!CollabError::rejected("model", "locked layer").is_retryable());
    }
}

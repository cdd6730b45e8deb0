//! Error types shared across the engine.

/// Failures of the backing document store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a chat-platform collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("Platform call timed out")]
    Timeout,

    #[error("Platform rejected the request: {0}")]
    Rejected(String),

    #[error("Platform unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by engine operations.
///
/// `NotFound`, `InvalidFormula` and `InvalidArgument` are ordinary outcomes
/// shown to the invoking user. `Storage` and `Platform` are faults: they are
/// logged and answered with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid formula: {0}")]
    InvalidFormula(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Text to show the invoking user, or `None` when nothing should be said.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::NotFound(_) | Self::InvalidFormula(_) | Self::InvalidArgument(_) => {
                Some(self.to_string())
            }
            Self::PermissionDenied => None,
            Self::Storage(e) => {
                tracing::error!(error = %e, "Storage error while handling command");
                Some("Something went wrong while saving or loading data.".to_string())
            }
            Self::Platform(e) => {
                tracing::warn!(error = %e, "Platform error while handling command");
                Some("The chat platform did not respond, please try again.".to_string())
            }
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let missing = EngineError::not_found("Conversion for 'furlong'");
        assert_eq!(
            missing.user_message().as_deref(),
            Some("Conversion for 'furlong' not found")
        );

        let formula = EngineError::InvalidFormula("unknown name 'y'".into());
        assert!(formula.user_message().unwrap().contains("unknown name"));

        assert!(EngineError::PermissionDenied.user_message().is_none());
    }

    #[test]
    fn test_storage_errors_are_not_leaked() {
        let err = EngineError::from(StorageError::Unavailable("disk on fire".into()));
        let message = err.user_message().unwrap();
        assert!(!message.contains("disk on fire"));
    }
}

use thiserror::Error;

use crate::entity::EntityKind;
use crate::providers::ProviderError;

/// Errors reported to callers of the navigation core.
///
/// None of these end a session: every operation reports its failure to the
/// immediate caller and leaves selection, cache and history as they were
/// (batch delete is the documented exception, it always refreshes the parent).
#[derive(Error, Debug)]
pub enum NavError {
    /// Provider I/O failed; only the current call is aborted
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Nothing matched the requested path
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// An entity with the requested name already exists
    #[error("name already in use: {0}")]
    NameConflict(String),

    /// A delete batch removed nothing
    #[error("could not delete the selected {kind}")]
    DeleteFailed { kind: EntityKind },

    /// A provider id does not resolve to a registered provider
    #[error("invalid file provider: {0}")]
    InvalidFileProvider(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    /// The request does not fit the operation (empty or mixed-provider batch, ...)
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NavResult<T> = Result<T, NavError>;

impl From<ProviderError> for NavError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound(p) => NavError::PathNotFound(p),
            ProviderError::AlreadyExists(p) => NavError::NameConflict(p),
            ProviderError::NotSupported(what) => NavError::NotSupported(what),
            other => NavError::BackendUnavailable(other.to_string()),
        }
    }
}

impl NavError {
    /// Whether the error only means "stay where you are"
    pub fn is_not_found(&self) -> bool {
        matches!(self, NavError::PathNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let e: NavError = ProviderError::NotFound("/x".to_string()).into();
        assert!(e.is_not_found());

        let e: NavError = ProviderError::AlreadyExists("/x/y".to_string()).into();
        assert!(matches!(e, NavError::NameConflict(p) if p == "/x/y"));

        let e: NavError = ProviderError::Connection("refused".to_string()).into();
        assert!(matches!(e, NavError::BackendUnavailable(_)));
    }

    #[test]
    fn test_delete_failed_message_names_kind() {
        let e = NavError::DeleteFailed { kind: EntityKind::Folder };
        assert_eq!(e.to_string(), "could not delete the selected folder");
    }
}

//! Error types for page storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during page storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A page was requested that the backend does not hold.
    #[error("page {page} of model {model} does not exist")]
    PageMissing {
        /// The model directory the page belongs to.
        model: String,
        /// The missing page index.
        page: u64,
    },

    /// A staged replacement was promoted or discarded without being staged.
    #[error("no staged replacement for page {page} of model {model}")]
    NoStagedPage {
        /// The model directory the page belongs to.
        model: String,
        /// The page index without a staged replacement.
        page: u64,
    },
}

impl StorageError {
    /// Creates a [`StorageError::PageMissing`] error.
    pub fn page_missing(model: impl Into<String>, page: u64) -> Self {
        Self::PageMissing {
            model: model.into(),
            page,
        }
    }

    /// Creates a [`StorageError::NoStagedPage`] error.
    pub fn no_staged_page(model: impl Into<String>, page: u64) -> Self {
        Self::NoStagedPage {
            model: model.into(),
            page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_missing_display() {
        let err = StorageError::page_missing("Person", 3);
        assert_eq!(err.to_string(), "page 3 of model Person does not exist");
    }

    #[test]
    fn io_errors_convert() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: StorageError = io_err.into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}

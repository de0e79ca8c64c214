//! Error types for CastDB core.

use std::io;

use castdb_codec::{PageIndex, RecordId};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in CastDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Schema derivation or catalog error.
    #[error("schema error: {0}")]
    Schema(#[from] castdb_schema::SchemaError),

    /// Row codec error.
    #[error("codec error: {0}")]
    Codec(#[from] castdb_codec::CodecError),

    /// Page storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] castdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Store is already open in another process.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Invalid store layout or file format.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A filed record's row is not on the page it claims.
    #[error("no row {id} on page {} of model {model}", .page.as_u64())]
    RowNotFound {
        /// The model whose pages were searched.
        model: String,
        /// The page the record claimed to live on.
        page: PageIndex,
        /// The record identity that was not found.
        id: RecordId,
    },

    /// A multi-row write stopped partway through its queue.
    ///
    /// Rows applied before the failure are durable and stay in place;
    /// the rest of the queue was abandoned. Since child rows always land
    /// before the rows that reference them, the store never holds a
    /// reference to a row that does not exist.
    #[error("write aborted after {applied} of {} row(s): {source}", .applied + .abandoned)]
    WriteAborted {
        /// Rows durably applied before the failure.
        applied: usize,
        /// Rows abandoned, the failing one included.
        abandoned: usize,
        /// The error that stopped the queue.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a row not found error.
    pub fn row_not_found(model: impl Into<String>, page: PageIndex, id: RecordId) -> Self {
        Self::RowNotFound {
            model: model.into(),
            page,
            id,
        }
    }

    /// Creates a write aborted error.
    pub fn write_aborted(applied: usize, abandoned: usize, source: CoreError) -> Self {
        Self::WriteAborted {
            applied,
            abandoned,
            source: Box::new(source),
        }
    }
}

//! Tree encoding: one record tree in, a queue of row operations out.

use std::collections::HashSet;

use castdb_schema::EncodingCatalog;

use crate::error::{CodecError, CodecResult};
use crate::record::{PageIndex, Record, RecordId, RecordStatus, Value};
use crate::row::encode_row;

/// A fully encoded row waiting to be applied to a page store.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOperation {
    /// Append a new row to the model's head page.
    Create {
        /// The model whose pages receive the row.
        model: String,
        /// The encoded record's identity.
        id: RecordId,
        /// The complete framed row, length prefix included.
        row: Vec<u8>,
    },
    /// Rewrite the record's existing row on its page.
    Update {
        /// The model whose pages hold the row.
        model: String,
        /// The page the row lives on.
        page: PageIndex,
        /// The encoded record's identity.
        id: RecordId,
        /// The complete framed replacement row, length prefix included.
        row: Vec<u8>,
    },
}

impl RowOperation {
    /// Returns the model the operation applies to.
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Create { model, .. } | Self::Update { model, .. } => model,
        }
    }

    /// Returns the identity of the encoded record.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        match self {
            Self::Create { id, .. } | Self::Update { id, .. } => *id,
        }
    }

    /// Returns the framed row bytes.
    #[must_use]
    pub fn row(&self) -> &[u8] {
        match self {
            Self::Create { row, .. } | Self::Update { row, .. } => row,
        }
    }
}

/// Encodes a record tree into deferred operations plus the root's own.
///
/// The tree is walked depth-first in slot order; values without a slot in
/// their model's layout are ignored, children included. Every *new* child
/// record becomes a deferred [`RowOperation::Create`], pushed deepest
/// first, so applying the queue in order never files a row that references
/// a record with no durable row of its own. Children that are already
/// filed are leaf references: they contribute their 16-byte ID to the
/// parent's row and are not walked further.
///
/// Records are deduplicated by ID - the first occurrence of an ID in the
/// walk produces its operation, later occurrences only contribute the ID
/// bytes.
///
/// The root's operation is returned separately: a create when the root is
/// new, a rewrite of its existing row when it is filed.
///
/// # Errors
///
/// [`CodecError::UnknownModel`] when the catalog lacks a layout for the
/// root or any new child, plus every row-level error of
/// [`encode_row`](crate::encode_row).
pub fn encode_tree(
    catalog: &EncodingCatalog,
    record: &Record,
) -> CodecResult<(Vec<RowOperation>, RowOperation)> {
    let mut deferred = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(record.id());
    let row = encode_record(catalog, record, &mut deferred, &mut visited)?;
    let this = match record.status() {
        RecordStatus::New => RowOperation::Create {
            model: record.model().to_string(),
            id: record.id(),
            row,
        },
        RecordStatus::Filed(page) => RowOperation::Update {
            model: record.model().to_string(),
            page,
            id: record.id(),
            row,
        },
    };
    Ok((deferred, this))
}

fn encode_record(
    catalog: &EncodingCatalog,
    record: &Record,
    deferred: &mut Vec<RowOperation>,
    visited: &mut HashSet<RecordId>,
) -> CodecResult<Vec<u8>> {
    let schema = catalog
        .get(record.model())
        .ok_or_else(|| CodecError::unknown_model(record.model()))?;
    // Children go first so their creates land ahead of every row that
    // references them.
    for slot in schema.slots() {
        let Some(Value::Child(child)) = record.value(slot.key()) else {
            continue;
        };
        if !child.status().is_new() || !visited.insert(child.id()) {
            continue;
        }
        let row = encode_record(catalog, child, deferred, visited)?;
        deferred.push(RowOperation::Create {
            model: child.model().to_string(),
            id: child.id(),
            row,
        });
    }
    encode_row(schema, record)
}

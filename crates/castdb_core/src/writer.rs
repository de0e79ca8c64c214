//! Applying an encoded operation queue to pages.
//!
//! A record tree encodes into a queue of row operations: deferred creates
//! for new children, deepest first, then the root's own create or update.
//! This module drains that queue against a [`PageStore`] one durable row at
//! a time. There is no cross-row transaction; what the ordering guarantees
//! instead is that a reference is only ever written after the row it points
//! to, so a failure partway leaves extra rows, never dangling ones.

use std::collections::HashMap;

use castdb_codec::{PageIndex, Record, RecordId, RowOperation, Value};
use castdb_storage::PageBackend;
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::pages::PageStore;

/// Applies the deferred operations and then the root's, in order.
///
/// Returns the page every applied record landed on, keyed by record ID.
///
/// A failure on the first operation propagates as-is since nothing has
/// changed; a later failure wraps in [`CoreError::WriteAborted`] to record
/// how many rows are already durable and how many were abandoned.
pub(crate) fn apply_queue<B: PageBackend>(
    pages: &mut PageStore<B>,
    deferred: &[RowOperation],
    root: &RowOperation,
) -> CoreResult<HashMap<RecordId, PageIndex>> {
    let total = deferred.len() + 1;
    let mut filed = HashMap::with_capacity(total);
    for (applied, op) in deferred.iter().chain(std::iter::once(root)).enumerate() {
        match pages.apply(op) {
            Ok(page) => {
                filed.insert(op.id(), page);
            }
            Err(source) if applied == 0 => return Err(source),
            Err(source) => {
                warn!(
                    "Write of {} stopped after {} of {} row(s): {}",
                    root.model(),
                    applied,
                    total,
                    source
                );
                return Err(CoreError::write_aborted(applied, total - applied, source));
            }
        }
    }
    Ok(filed)
}

/// Marks every record in the tree that landed on a page as filed there.
///
/// Records absent from the map keep their status: children that were
/// already filed stay on their old page, and values the layout ignored
/// stay new.
pub(crate) fn file_tree(record: &mut Record, filed: &HashMap<RecordId, PageIndex>) {
    if let Some(&page) = filed.get(&record.id()) {
        record.mark_filed(page);
    }
    for (_, value) in record.values_mut() {
        if let Value::Child(child) = value {
            file_tree(child, filed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castdb_codec::encode_tree;
    use castdb_schema::{EncodingCatalog, RawDecl, RawGraph, RawType, SchemaBuilder};
    use castdb_storage::InMemoryBackend;

    use crate::config::Config;

    fn catalog() -> EncodingCatalog {
        let mut graph = RawGraph::new();
        graph
            .declare(
                "Person",
                RawDecl::data()
                    .property("name", RawType::Str)
                    .property("age", RawType::Number),
            )
            .unwrap();
        graph
            .declare(
                "Band",
                RawDecl::data()
                    .property("title", RawType::Str)
                    .property("leader", RawType::name("Person")),
            )
            .unwrap();
        let mut builder = SchemaBuilder::new(&graph);
        let solids = ["Person", "Band"].map(|symbol| builder.solidify(symbol).unwrap());
        EncodingCatalog::initial_for(solids.iter())
    }

    fn store() -> PageStore<InMemoryBackend> {
        PageStore::new(InMemoryBackend::new(), &Config::new())
    }

    #[test]
    fn a_tree_queue_files_every_row() {
        let catalog = catalog();
        let mut pages = store();
        let leader = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let leader_id = leader.id();
        let band = Record::new("Band").set("title", "Analytical").set("leader", leader);

        let (deferred, root) = encode_tree(&catalog, &band).unwrap();
        let filed = apply_queue(&mut pages, &deferred, &root).unwrap();

        assert_eq!(filed.len(), 2);
        assert_eq!(filed[&leader_id], PageIndex::new(0));
        assert_eq!(filed[&band.id()], PageIndex::new(0));
        assert!(pages.find_row("Person", PageIndex::new(0), leader_id).is_ok());
        assert!(pages.find_row("Band", PageIndex::new(0), band.id()).is_ok());
    }

    #[test]
    fn a_first_row_failure_propagates_unwrapped() {
        let catalog = catalog();
        let mut pages = store();
        // A filed root with no children: the queue is just the update, and
        // its page was never written.
        let lone = Record::filed("Person", RecordId::new(), PageIndex::new(0))
            .set("name", "Ada")
            .set("age", 36.0);

        let (deferred, root) = encode_tree(&catalog, &lone).unwrap();
        assert!(deferred.is_empty());
        let err = apply_queue(&mut pages, &deferred, &root).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn a_late_failure_reports_the_durable_progress() {
        let catalog = catalog();
        let mut pages = store();

        // Settle one band so page 0 of Band exists.
        let first_leader = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let first = Record::new("Band")
            .set("title", "Analytical")
            .set("leader", first_leader);
        let (deferred, root) = encode_tree(&catalog, &first).unwrap();
        apply_queue(&mut pages, &deferred, &root).unwrap();

        // This root claims a row on page 0 that is not there, so its child
        // lands and the root's update fails.
        let leader = Record::new("Person").set("name", "Grace").set("age", 45.0);
        let leader_id = leader.id();
        let band = Record::filed("Band", RecordId::new(), PageIndex::new(0))
            .set("title", "Harvard Mark I")
            .set("leader", leader);

        let (deferred, root) = encode_tree(&catalog, &band).unwrap();
        let err = apply_queue(&mut pages, &deferred, &root).unwrap_err();
        match err {
            CoreError::WriteAborted {
                applied,
                abandoned,
                source,
            } => {
                assert_eq!(applied, 1);
                assert_eq!(abandoned, 1);
                assert!(matches!(*source, CoreError::RowNotFound { .. }));
            }
            other => panic!("expected WriteAborted, got {other}"),
        }
        // The child row stayed durable even though the root never landed.
        assert!(pages.find_row("Person", PageIndex::new(0), leader_id).is_ok());
        assert_eq!(pages.scan_model("Band").unwrap().len(), 1);
    }

    #[test]
    fn file_tree_marks_root_and_children() {
        let leader = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let leader_id = leader.id();
        let mut band = Record::new("Band").set("title", "Analytical").set("leader", leader);

        let mut filed = HashMap::new();
        filed.insert(band.id(), PageIndex::new(2));
        filed.insert(leader_id, PageIndex::new(0));
        file_tree(&mut band, &filed);

        assert_eq!(band.status().page(), Some(PageIndex::new(2)));
        let child = band.value("leader").and_then(Value::as_child).unwrap();
        assert_eq!(child.status().page(), Some(PageIndex::new(0)));
    }

    #[test]
    fn file_tree_leaves_absent_records_alone() {
        let settled = Record::filed("Person", RecordId::new(), PageIndex::new(7))
            .set("name", "Ada")
            .set("age", 36.0);
        let mut band = Record::new("Band").set("title", "Analytical").set("leader", settled);

        let mut filed = HashMap::new();
        filed.insert(band.id(), PageIndex::new(0));
        file_tree(&mut band, &filed);

        assert_eq!(band.status().page(), Some(PageIndex::new(0)));
        let child = band.value("leader").and_then(Value::as_child).unwrap();
        // The already-filed leader was a leaf reference, not rewritten.
        assert_eq!(child.status().page(), Some(PageIndex::new(7)));
    }
}

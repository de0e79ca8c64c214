//! The store facade: open a directory, register model layouts, write and
//! read record trees.

use std::path::Path;

use castdb_codec::{
    decode_row, encode_tree, CodecError, DecodedRow, PageIndex, Record, RecordId,
};
use castdb_schema::{EncodingCatalog, EncodingSchema, SolidModel};
use castdb_storage::{FileBackend, InMemoryBackend, PageBackend};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::CoreResult;
use crate::pages::PageStore;
use crate::writer;

/// An open record store.
///
/// A store owns an [`EncodingCatalog`] of model layouts and a page store
/// over some backend. Records are written as whole trees: new children
/// land before the rows that reference them, the root lands last, and the
/// returned copy of the tree carries the page every record was filed on.
///
/// File-backed stores hold an exclusive directory lock for their lifetime
/// and persist the catalog in the store directory, so layouts survive a
/// reopen. In-memory stores skip both.
///
/// # Example
///
/// ```no_run
/// use castdb_core::Store;
/// use castdb_codec::Record;
/// use castdb_schema::{RawDecl, RawGraph, RawType, SchemaBuilder};
///
/// # fn main() -> castdb_core::CoreResult<()> {
/// let mut graph = RawGraph::new();
/// graph.declare("Person", RawDecl::data().property("name", RawType::Str))?;
/// let mut builder = SchemaBuilder::new(&graph);
/// let person = builder.solidify("Person")?;
///
/// let mut store = Store::open("/var/lib/castdb")?;
/// store.register_model(&person)?;
/// let filed = store.write(&Record::new("Person").set("name", "Ada"))?;
/// assert!(!filed.status().is_new());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Store<B: PageBackend> {
    /// Directory lock and catalog persistence; `None` for in-memory stores.
    dir: Option<StoreDir>,
    pages: PageStore<B>,
    catalog: EncodingCatalog,
    swept: usize,
}

impl Store<FileBackend> {
    /// Opens or creates a file-backed store with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens or creates a file-backed store.
    ///
    /// Acquires the directory lock, loads the persisted catalog if one
    /// exists, and sweeps staged page images left behind by an interrupted
    /// rewrite ([`swept_staged`](Self::swept_staged) reports how many).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreLocked`](crate::CoreError::StoreLocked)
    /// when another process holds the store, an invalid format error when
    /// the path is missing (without `create_if_missing`) or not a
    /// directory, and I/O or decode errors for an unreadable catalog.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let catalog = dir.load_catalog()?.unwrap_or_default();
        let mut pages = PageStore::new(FileBackend::new(dir.data_dir()), &config);
        let swept = pages.sweep_staged()?;
        if swept > 0 {
            warn!(
                "Swept {} staged page image(s) left by an interrupted rewrite",
                swept
            );
        }
        info!(
            "Opened store at {} with {} model layout(s)",
            path.display(),
            catalog.len()
        );
        Ok(Self {
            dir: Some(dir),
            pages,
            catalog,
            swept,
        })
    }
}

impl Store<InMemoryBackend> {
    /// Opens an ephemeral in-memory store with the default configuration.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an ephemeral in-memory store.
    ///
    /// Nothing persists: the catalog starts empty and pages vanish with
    /// the value. `create_if_missing` is ignored.
    #[must_use]
    pub fn open_in_memory_with_config(config: Config) -> Self {
        Self {
            dir: None,
            pages: PageStore::new(InMemoryBackend::new(), &config),
            catalog: EncodingCatalog::new(),
            swept: 0,
        }
    }
}

impl<B: PageBackend> Store<B> {
    /// Registers a model's layout, evolving any existing one.
    ///
    /// A model seen for the first time gets its initial layout. A model
    /// already in the catalog keeps its surviving slots in place and
    /// appends slots for new properties, so existing rows stay readable.
    /// File-backed stores persist the updated catalog before returning.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the solidified model is not storable,
    /// and I/O errors if the catalog cannot be persisted.
    pub fn register_model(&mut self, solid: &SolidModel) -> CoreResult<()> {
        self.catalog.evolve(solid)?;
        debug!("Registered layout for model {}", solid.symbol());
        self.persist_catalog()
    }

    /// Returns the layout registered for a model, if any.
    #[must_use]
    pub fn schema(&self, model: &str) -> Option<&EncodingSchema> {
        self.catalog.get(model)
    }

    /// Returns the store's encoding catalog.
    #[must_use]
    pub fn catalog(&self) -> &EncodingCatalog {
        &self.catalog
    }

    /// Returns how many staged page images were swept at open.
    #[must_use]
    pub fn swept_staged(&self) -> usize {
        self.swept
    }

    /// Writes a record tree and returns it with every record filed.
    ///
    /// New records append rows, records already filed get their row
    /// rewritten in place, and new children always land before the rows
    /// that reference them. The input is untouched; the returned copy
    /// carries the page index each record landed on.
    ///
    /// # Errors
    ///
    /// Codec errors when a model is unregistered or a record cannot fill
    /// its layout, [`CoreError::RowNotFound`](crate::CoreError::RowNotFound)
    /// when a filed record's row is gone, and
    /// [`CoreError::WriteAborted`](crate::CoreError::WriteAborted) when a
    /// failure strikes after part of the tree is already durable.
    pub fn write(&mut self, record: &Record) -> CoreResult<Record> {
        let (deferred, root) = encode_tree(&self.catalog, record)?;
        debug!(
            "Writing {} with {} deferred row(s)",
            record.model(),
            deferred.len()
        );
        let filed = writer::apply_queue(&mut self.pages, &deferred, &root)?;
        let mut result = record.clone();
        writer::file_tree(&mut result, &filed);
        Ok(result)
    }

    /// Fetches and decodes one record's row from the page it was filed on.
    ///
    /// # Errors
    ///
    /// A codec error when the model is unregistered or the row does not
    /// decode, [`CoreError::RowNotFound`](crate::CoreError::RowNotFound)
    /// when the page holds no such row, and storage errors for a missing
    /// page.
    pub fn fetch_row(&self, model: &str, page: PageIndex, id: RecordId) -> CoreResult<DecodedRow> {
        let schema = self.schema_or_err(model)?;
        let body = self.pages.find_row(model, page, id)?;
        Ok(decode_row(schema, &body)?)
    }

    /// Searches every page of a model for a record whose page is unknown.
    ///
    /// Returns the page and decoded row of the first match, or `None`
    /// when no page holds the ID.
    ///
    /// # Errors
    ///
    /// A codec error when the model is unregistered or the row does not
    /// decode, and storage errors for unreadable pages.
    pub fn locate_row(
        &self,
        model: &str,
        id: RecordId,
    ) -> CoreResult<Option<(PageIndex, DecodedRow)>> {
        let schema = self.schema_or_err(model)?;
        match self.pages.locate(model, id)? {
            Some((page, body)) => Ok(Some((page, decode_row(schema, &body)?))),
            None => Ok(None),
        }
    }

    /// Decodes every row of a model, page by page in index order.
    ///
    /// Returns each decoded row paired with the page it lives on.
    ///
    /// # Errors
    ///
    /// A codec error when the model is unregistered or a row does not
    /// decode, and storage errors for unreadable pages.
    pub fn scan_model(&self, model: &str) -> CoreResult<Vec<(PageIndex, DecodedRow)>> {
        let schema = self.schema_or_err(model)?;
        self.pages
            .scan_model(model)?
            .into_iter()
            .map(|(page, body)| Ok((page, decode_row(schema, &body)?)))
            .collect()
    }

    /// Saves the catalog for file-backed stores; a no-op in memory.
    fn persist_catalog(&self) -> CoreResult<()> {
        match &self.dir {
            Some(dir) => dir.save_catalog(&self.catalog),
            None => Ok(()),
        }
    }

    fn schema_or_err(&self, model: &str) -> CoreResult<&EncodingSchema> {
        self.catalog
            .get(model)
            .ok_or_else(|| CodecError::unknown_model(model).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use castdb_codec::{DecodedValue, Value};
    use castdb_schema::{RawDecl, RawGraph, RawType, SchemaBuilder};
    use tempfile::tempdir;

    use crate::error::CoreError;

    fn solids() -> Vec<SolidModel> {
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
        ["Person", "Band"]
            .map(|symbol| builder.solidify(symbol).unwrap())
            .into_iter()
            .collect()
    }

    fn memory_store() -> Store<InMemoryBackend> {
        let mut store = Store::open_in_memory();
        for solid in &solids() {
            store.register_model(solid).unwrap();
        }
        store
    }

    #[test]
    fn open_creates_the_store_layout() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = Store::open(&path).unwrap();
        assert!(path.join("LOCK").is_file());
        assert!(path.join("data").is_dir());
        assert_eq!(store.swept_staged(), 0);
        assert!(store.catalog().is_empty());
    }

    #[test]
    fn a_second_open_is_refused_while_locked() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let _store = Store::open(&path).unwrap();
        let second = Store::open(&path);
        assert!(matches!(second, Err(CoreError::StoreLocked)));
    }

    #[test]
    fn open_without_create_requires_the_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("absent");
        let config = Config::new().create_if_missing(false);
        let result = Store::open_with_config(&path, config);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn registered_layouts_survive_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let mut store = Store::open(&path).unwrap();
        for solid in &solids() {
            store.register_model(solid).unwrap();
        }
        let catalog = store.catalog().clone();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.catalog(), &catalog);
        assert!(reopened.schema("Person").is_some());
        assert!(reopened.schema("Band").is_some());
    }

    #[test]
    fn writing_files_the_record_without_touching_the_input() {
        let mut store = memory_store();
        let person = Record::new("Person").set("name", "Ada").set("age", 36.0);

        let filed = store.write(&person).unwrap();

        assert!(person.status().is_new());
        assert_eq!(filed.status().page(), Some(PageIndex::new(0)));
        assert_eq!(filed.id(), person.id());
    }

    #[test]
    fn a_written_tree_comes_back_fully_filed() {
        let mut store = memory_store();
        let leader = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let leader_id = leader.id();
        let band = Record::new("Band").set("title", "Analytical").set("leader", leader);

        let filed = store.write(&band).unwrap();

        let band_page = filed.status().page().unwrap();
        let child = filed.value("leader").and_then(Value::as_child).unwrap();
        assert_eq!(child.status().page(), Some(PageIndex::new(0)));

        let row = store.fetch_row("Band", band_page, filed.id()).unwrap();
        assert_eq!(row.values["leader"], DecodedValue::Reference(leader_id));
        assert_eq!(
            row.values["title"],
            DecodedValue::Text("Analytical".to_string())
        );
    }

    #[test]
    fn locate_row_finds_a_record_without_its_page() {
        let config = Config::new().page_rotation_threshold(0);
        let mut store = Store::open_in_memory_with_config(config);
        for solid in &solids() {
            store.register_model(solid).unwrap();
        }
        store
            .write(&Record::new("Person").set("name", "Ada").set("age", 36.0))
            .unwrap();
        let grace = store
            .write(&Record::new("Person").set("name", "Grace").set("age", 45.0))
            .unwrap();

        let (page, row) = store.locate_row("Person", grace.id()).unwrap().unwrap();
        assert_eq!(page, PageIndex::new(1));
        assert_eq!(row.values["name"], DecodedValue::Text("Grace".to_string()));
        assert!(store.locate_row("Person", RecordId::new()).unwrap().is_none());
    }

    #[test]
    fn rewriting_a_filed_record_replaces_its_row() {
        let mut store = memory_store();
        let person = Record::new("Person").set("name", "Ada").set("age", 36.0);

        let mut filed = store.write(&person).unwrap();
        filed.put("age", 37.0);
        let refiled = store.write(&filed).unwrap();

        assert_eq!(refiled.status().page(), filed.status().page());
        let rows = store.scan_model("Person").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.values["age"], DecodedValue::Number(37.0));
    }

    #[test]
    fn writes_of_unregistered_models_fail() {
        let mut store = Store::open_in_memory();
        let err = store
            .write(&Record::new("Person").set("name", "Ada"))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Codec(CodecError::UnknownModel { .. })
        ));
    }

    #[test]
    fn rotation_follows_the_configured_threshold() {
        let config = Config::new().page_rotation_threshold(0);
        let mut store = Store::open_in_memory_with_config(config);
        for solid in &solids() {
            store.register_model(solid).unwrap();
        }

        let first = store
            .write(&Record::new("Person").set("name", "Ada").set("age", 36.0))
            .unwrap();
        let second = store
            .write(&Record::new("Person").set("name", "Grace").set("age", 45.0))
            .unwrap();

        assert_eq!(first.status().page(), Some(PageIndex::new(0)));
        assert_eq!(second.status().page(), Some(PageIndex::new(1)));
    }

    #[test]
    fn rows_survive_a_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let mut store = Store::open(&path).unwrap();
        for solid in &solids() {
            store.register_model(solid).unwrap();
        }
        let filed = store
            .write(&Record::new("Person").set("name", "Ada").set("age", 36.0))
            .unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        let rows = reopened.scan_model("Person").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.id, filed.id());
        assert_eq!(rows[0].1.values["name"], DecodedValue::Text("Ada".to_string()));
    }

    #[test]
    fn stray_staged_images_are_swept_at_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let mut store = Store::open(&path).unwrap();
        for solid in &solids() {
            store.register_model(solid).unwrap();
        }
        let filed = store
            .write(&Record::new("Person").set("name", "Ada").set("age", 36.0))
            .unwrap();
        drop(store);

        let stray = path.join("data").join("Person").join("0.data__NEXT");
        fs::write(&stray, b"half-finished rewrite").unwrap();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.swept_staged(), 1);
        assert!(!stray.exists());
        let row = reopened
            .fetch_row("Person", filed.status().page().unwrap(), filed.id())
            .unwrap();
        assert_eq!(row.id, filed.id());
    }
}

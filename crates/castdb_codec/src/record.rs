//! Records, identifiers, and filing status.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

/// Unique identifier for a record.
///
/// Record IDs are 128-bit UUIDs, stored and encoded in RFC 4122 byte
/// order. They are:
/// - Globally unique within a store
/// - Immutable once assigned
/// - Never reused
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId([u8; 16]);

impl RecordId {
    /// Creates a record ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }

    /// Creates a record ID from a slice.
    ///
    /// Returns `None` if the slice is not exactly 16 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 16 {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.to_uuid())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

impl From<[u8; 16]> for RecordId {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Index of a page within a model's page sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(pub u64);

impl PageIndex {
    /// Creates a new page index.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following page index.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page:{}", self.0)
    }
}

/// Whether a record already has a durable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// The record has never been written; filing it appends a new row.
    New,
    /// The record's row lives on the given page; filing it rewrites that
    /// row in place.
    Filed(PageIndex),
}

impl RecordStatus {
    /// Returns `true` for records that have never been written.
    #[must_use]
    pub const fn is_new(self) -> bool {
        matches!(self, Self::New)
    }

    /// Returns the page the record is filed on, if any.
    #[must_use]
    pub const fn page(self) -> Option<PageIndex> {
        match self {
            Self::New => None,
            Self::Filed(page) => Some(page),
        }
    }
}

/// A runtime property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A floating-point number.
    Number(f64),
    /// A UTF-8 string.
    Text(String),
    /// A nested record, stored as a reference to its ID.
    Child(Record),
}

impl Value {
    /// Returns a short name for the value's shape, for error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Child(_) => "child record",
        }
    }

    /// Returns the nested record, if the value holds one.
    #[must_use]
    pub const fn as_child(&self) -> Option<&Record> {
        match self {
            Self::Child(record) => Some(record),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Child(value)
    }
}

/// An in-memory record tree handed to the encoder.
///
/// A record always carries an identity: construction assigns a fresh
/// random [`RecordId`] unless one is given, so there is no such thing as a
/// record without one. Nested [`Value::Child`] values form the tree the
/// encoder walks.
///
/// # Example
///
/// ```
/// use castdb_codec::{Record, Value};
///
/// let person = Record::new("Person")
///     .set("name", "Ada")
///     .set("age", 36.0);
/// assert_eq!(person.value("name"), Some(&Value::Text("Ada".to_string())));
/// assert!(person.status().is_new());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: String,
    id: RecordId,
    status: RecordStatus,
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a new record of `model` with a fresh random ID.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_id(model, RecordId::new())
    }

    /// Creates a new record of `model` with the given ID.
    #[must_use]
    pub fn with_id(model: impl Into<String>, id: RecordId) -> Self {
        Self {
            model: model.into(),
            id,
            status: RecordStatus::New,
            values: BTreeMap::new(),
        }
    }

    /// Creates a record that already has a durable row on `page`.
    ///
    /// Used to rewrite an existing row: fill in the full set of property
    /// values and file the record again.
    #[must_use]
    pub fn filed(model: impl Into<String>, id: RecordId, page: PageIndex) -> Self {
        Self {
            model: model.into(),
            id,
            status: RecordStatus::Filed(page),
            values: BTreeMap::new(),
        }
    }

    /// Sets a property value, builder style.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets a property value in place.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the model symbol.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the record's identity.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the filing status.
    #[must_use]
    pub const fn status(&self) -> RecordStatus {
        self.status
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns all property values in key order.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Iterates property values mutably, in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.values.iter_mut()
    }

    /// Marks the record as filed on `page`.
    pub fn mark_filed(&mut self, page: PageIndex) {
        self.status = RecordStatus::Filed(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn id_byte_round_trip() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let id = RecordId::from_bytes(bytes);
        assert_eq!(*id.as_bytes(), bytes);
        assert_eq!(RecordId::from_slice(&bytes), Some(id));
        assert_eq!(RecordId::from_slice(&bytes[..15]), None);
    }

    #[test]
    fn to_uuid_preserves_the_bytes() {
        let id = RecordId::new();
        assert_eq!(id.to_uuid().into_bytes(), *id.as_bytes());
    }

    #[test]
    fn page_index_advances() {
        let page = PageIndex::new(3);
        assert_eq!(page.next(), PageIndex::new(4));
        assert_eq!(page.as_u64(), 3);
        assert_eq!(page.to_string(), "page:3");
    }

    #[test]
    fn status_reports_pages() {
        assert!(RecordStatus::New.is_new());
        assert_eq!(RecordStatus::New.page(), None);
        let filed = RecordStatus::Filed(PageIndex::new(2));
        assert!(!filed.is_new());
        assert_eq!(filed.page(), Some(PageIndex::new(2)));
    }

    #[test]
    fn records_always_have_an_identity() {
        let a = Record::new("Person");
        let b = Record::new("Person");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn set_and_put_store_values() {
        let mut record = Record::new("Person").set("name", "Ada");
        record.put("age", 36.0);
        record.put("alive", true);
        assert_eq!(record.value("name"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(record.value("age"), Some(&Value::Number(36.0)));
        assert_eq!(record.value("alive"), Some(&Value::Bool(true)));
        assert_eq!(record.value("missing"), None);
        assert_eq!(record.values().len(), 3);
    }

    #[test]
    fn children_nest_as_values() {
        let leader = Record::new("Person").set("name", "Ada");
        let leader_id = leader.id();
        let band = Record::new("Band").set("leader", leader);
        let child = band.value("leader").and_then(Value::as_child).unwrap();
        assert_eq!(child.id(), leader_id);
        assert_eq!(band.value("leader").unwrap().shape(), "child record");
    }

    #[test]
    fn mark_filed_updates_the_status() {
        let mut record = Record::new("Person");
        assert!(record.status().is_new());
        record.mark_filed(PageIndex::new(5));
        assert_eq!(record.status(), RecordStatus::Filed(PageIndex::new(5)));
    }
}

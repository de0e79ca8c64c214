//! Encoding schemas: the ordered binary field layout of each model.
//!
//! A [`SolidModel`] says *what* a record holds; an [`EncodingSchema`] fixes
//! the *order* its storable fields are written in. Layouts are append-only
//! across schema evolution: [`EncodingSchema::next`] keeps every still-valid
//! slot where it was and pushes newcomers to the tail, so rows written under
//! an older layout stay decodable by position.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{SchemaError, SchemaResult};
use crate::model::ElementKind;
use crate::solidify::SolidModel;

/// Key under which the identifier slot renders.
pub const IDENTIFIER_SLOT_KEY: &str = "__id";

/// Magic bytes at the start of a serialized encoding catalog.
pub const CATALOG_MAGIC: [u8; 4] = *b"CENC";

/// Serialization version for encoding catalogs.
pub const CATALOG_VERSION: u16 = 1;

/// One field slot in a model's binary row layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// The record identifier; always the first slot.
    Identifier,
    /// A storable property.
    Property {
        /// The property key.
        key: String,
        /// The element kind the field encodes.
        kind: ElementKind,
    },
}

impl Slot {
    /// Returns the key this slot renders under.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Identifier => IDENTIFIER_SLOT_KEY,
            Self::Property { key, .. } => key,
        }
    }

    /// Returns the element kind of a property slot.
    #[must_use]
    pub const fn kind(&self) -> Option<ElementKind> {
        match self {
            Self::Identifier => None,
            Self::Property { kind, .. } => Some(*kind),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier => write!(f, "{IDENTIFIER_SLOT_KEY}"),
            Self::Property { key, kind } => write!(f, "{key}:{kind}"),
        }
    }
}

/// The ordered field layout for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingSchema {
    model: String,
    slots: Vec<Slot>,
}

impl EncodingSchema {
    /// Builds the first layout for a freshly solidified model.
    ///
    /// The identifier slot comes first, followed by every storable property
    /// in lexicographic key order. Literal properties are baked into the
    /// schema and get no slot.
    #[must_use]
    pub fn initial(solid: &SolidModel) -> Self {
        let mut slots = vec![Slot::Identifier];
        for (key, element) in solid.properties() {
            if !element.kind().is_storable() {
                continue;
            }
            slots.push(Slot::Property {
                key: key.clone(),
                kind: element.kind(),
            });
        }
        Self {
            model: solid.symbol().to_string(),
            slots,
        }
    }

    /// Evolves this layout to match a re-solidified model.
    ///
    /// Slots whose key still exists with the same element kind keep their
    /// position; removed or re-kinded slots drop out; new storable
    /// properties append at the tail in lexicographic key order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ModelMismatch`] if `solid` was solidified from
    /// a different symbol than this layout describes.
    pub fn next(&self, solid: &SolidModel) -> SchemaResult<Self> {
        if self.model != solid.symbol() {
            return Err(SchemaError::ModelMismatch {
                schema: self.model.clone(),
                model: solid.symbol().to_string(),
            });
        }
        let mut desired: BTreeMap<&str, ElementKind> = BTreeMap::new();
        for (key, element) in solid.properties() {
            if element.kind().is_storable() {
                desired.insert(key, element.kind());
            }
        }
        let mut slots = vec![Slot::Identifier];
        let mut kept: BTreeSet<&str> = BTreeSet::new();
        for slot in &self.slots {
            let Slot::Property { key, kind } = slot else {
                continue;
            };
            if desired.get(key.as_str()) == Some(kind) {
                slots.push(slot.clone());
                kept.insert(key);
            }
        }
        for (key, kind) in desired {
            if !kept.contains(key) {
                slots.push(Slot::Property {
                    key: key.to_string(),
                    kind,
                });
            }
        }
        Ok(Self {
            model: self.model.clone(),
            slots,
        })
    }

    /// Builds a layout from raw parts.
    ///
    /// Callers keep the identifier slot first themselves; this is mainly
    /// useful in tests and when deserializing hand-carried layouts.
    #[must_use]
    pub fn from_slots(model: impl Into<String>, slots: Vec<Slot>) -> Self {
        Self {
            model: model.into(),
            slots,
        }
    }

    /// Returns the symbol of the model this layout describes.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the slots in row order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Returns the position of the slot rendering under `key`.
    #[must_use]
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.key() == key)
    }

    /// Returns the number of slots, identifier included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the layout has no slots at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> SchemaResult<()> {
        encode_str(buf, &self.model)?;
        buf.extend_from_slice(&(self.slots.len() as u32).to_le_bytes());
        for slot in &self.slots {
            match slot {
                Slot::Identifier => buf.push(0),
                Slot::Property { key, kind } => {
                    buf.push(1);
                    buf.push(kind.as_byte());
                    encode_str(buf, key)?;
                }
            }
        }
        Ok(())
    }

    fn decode_from(data: &[u8], cursor: &mut usize) -> SchemaResult<Self> {
        let model = decode_str(data, cursor)?;
        let slot_count = decode_u32(data, cursor)?;
        let mut slots = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            let tag = decode_u8(data, cursor)?;
            match tag {
                0 => slots.push(Slot::Identifier),
                1 => {
                    let kind_byte = decode_u8(data, cursor)?;
                    let kind = ElementKind::from_byte(kind_byte).ok_or_else(|| {
                        SchemaError::invalid_format(format!(
                            "unknown element kind tag {kind_byte}"
                        ))
                    })?;
                    let key = decode_str(data, cursor)?;
                    slots.push(Slot::Property { key, kind });
                }
                other => {
                    return Err(SchemaError::invalid_format(format!(
                        "unknown slot tag {other}"
                    )))
                }
            }
        }
        Ok(Self { model, slots })
    }
}

/// Encoding schemas for every model a store knows about, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingCatalog {
    schemas: BTreeMap<String, EncodingSchema>,
}

impl EncodingCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds initial layouts for every given model.
    #[must_use]
    pub fn initial_for<'a>(solids: impl IntoIterator<Item = &'a SolidModel>) -> Self {
        let mut catalog = Self::new();
        for solid in solids {
            catalog.insert(EncodingSchema::initial(solid));
        }
        catalog
    }

    /// Inserts or replaces the layout for the schema's model.
    pub fn insert(&mut self, schema: EncodingSchema) {
        self.schemas.insert(schema.model().to_string(), schema);
    }

    /// Looks up the layout for `model`.
    #[must_use]
    pub fn get(&self, model: &str) -> Option<&EncodingSchema> {
        self.schemas.get(model)
    }

    /// Evolves the layout for `solid`, installing an initial layout when the
    /// model is new, and returns the resulting schema.
    ///
    /// # Errors
    ///
    /// Propagates [`SchemaError::ModelMismatch`] from [`EncodingSchema::next`],
    /// which cannot happen for entries inserted through this catalog.
    pub fn evolve(&mut self, solid: &SolidModel) -> SchemaResult<&EncodingSchema> {
        let schema = match self.schemas.get(solid.symbol()) {
            Some(stale) => stale.next(solid)?,
            None => EncodingSchema::initial(solid),
        };
        self.insert(schema);
        Ok(&self.schemas[solid.symbol()])
    }

    /// Iterates layouts in model order.
    pub fn iter(&self) -> impl Iterator<Item = &EncodingSchema> {
        self.schemas.values()
    }

    /// Returns the number of layouts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if the catalog holds no layouts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Serializes the catalog to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidFormat`] when a model symbol or slot
    /// key is too long for the serialized form, rather than writing an
    /// image that would not decode.
    pub fn encode(&self) -> SchemaResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CATALOG_MAGIC);
        buf.extend_from_slice(&CATALOG_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.schemas.len() as u32).to_le_bytes());
        for schema in self.schemas.values() {
            schema.encode_into(&mut buf)?;
        }
        Ok(buf)
    }

    /// Deserializes a catalog from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidFormat`] on bad magic, an unsupported
    /// version, or truncated data.
    pub fn decode(data: &[u8]) -> SchemaResult<Self> {
        let mut cursor = 0usize;
        let magic = decode_bytes(data, &mut cursor, 4)?;
        if magic != CATALOG_MAGIC {
            return Err(SchemaError::invalid_format("bad catalog magic"));
        }
        let version = decode_u16(data, &mut cursor)?;
        if version != CATALOG_VERSION {
            return Err(SchemaError::invalid_format(format!(
                "unsupported catalog version {version}"
            )));
        }
        let count = decode_u32(data, &mut cursor)?;
        let mut schemas = BTreeMap::new();
        for _ in 0..count {
            let schema = EncodingSchema::decode_from(data, &mut cursor)?;
            schemas.insert(schema.model().to_string(), schema);
        }
        if cursor != data.len() {
            return Err(SchemaError::invalid_format("trailing bytes after catalog"));
        }
        Ok(Self { schemas })
    }
}

fn encode_str(buf: &mut Vec<u8>, text: &str) -> SchemaResult<()> {
    let len = u16::try_from(text.len()).map_err(|_| {
        SchemaError::invalid_format(format!("name of {} bytes is too long", text.len()))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

fn decode_bytes<'d>(data: &'d [u8], cursor: &mut usize, len: usize) -> SchemaResult<&'d [u8]> {
    let end = cursor
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| SchemaError::invalid_format("truncated catalog data"))?;
    let bytes = &data[*cursor..end];
    *cursor = end;
    Ok(bytes)
}

fn decode_u8(data: &[u8], cursor: &mut usize) -> SchemaResult<u8> {
    Ok(decode_bytes(data, cursor, 1)?[0])
}

fn decode_u16(data: &[u8], cursor: &mut usize) -> SchemaResult<u16> {
    let bytes = decode_bytes(data, cursor, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn decode_u32(data: &[u8], cursor: &mut usize) -> SchemaResult<u32> {
    let bytes = decode_bytes(data, cursor, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn decode_str(data: &[u8], cursor: &mut usize) -> SchemaResult<String> {
    let len = decode_u16(data, cursor)? as usize;
    let bytes = decode_bytes(data, cursor, len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| SchemaError::invalid_format("non-UTF-8 text in catalog"))
}

//! The binary row format: framing, field encoding, and scanning.
//!
//! A page is a plain concatenation of rows. Each row is framed as:
//!
//! ```text
//! +-----------+----------------+--------------------+------------+
//! | len: u32  | id: 16 bytes   | one field per slot | 0x0A       |
//! | LE        | RFC 4122 order | in layout order    | terminator |
//! +-----------+----------------+--------------------+------------+
//! ```
//!
//! The length prefix covers everything after itself, terminator included.
//! Fields encode by slot kind: booleans as one byte, numbers as
//! little-endian `f64`, strings as a `u32` little-endian byte count plus
//! UTF-8 bytes, and model references as the referenced record's 16-byte ID.
//! Nothing in a row is optional; a record that cannot fill every slot does
//! not encode.

use std::collections::BTreeMap;

use castdb_schema::{ElementKind, EncodingSchema, Slot};

use crate::error::{CodecError, CodecResult};
use crate::record::{Record, RecordId, Value};

/// Byte closing every row.
pub const ROW_TERMINATOR: u8 = 0x0A;

/// Size of the row length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the record ID field.
pub const ROW_ID_SIZE: usize = 16;

/// Smallest legal row body: an ID and the terminator.
pub const MIN_ROW_BODY: usize = ROW_ID_SIZE + 1;

/// Encodes a record into a complete framed row for the given layout.
///
/// Slots are written in layout order; values the record carries beyond the
/// layout's slots are ignored. Child values contribute their record ID
/// only - filing the children themselves is the encoder's concern, not the
/// row format's.
///
/// # Errors
///
/// [`CodecError::UnstorableSlot`] for literal or parameter slots,
/// [`CodecError::MissingProperty`] for a slot the record has no value for,
/// [`CodecError::TypeMismatch`] when a value contradicts its slot kind, and
/// [`CodecError::RowTooLarge`] when the body outgrows its length prefix.
pub fn encode_row(schema: &EncodingSchema, record: &Record) -> CodecResult<Vec<u8>> {
    let mut body = Vec::with_capacity(MIN_ROW_BODY);
    body.extend_from_slice(record.id().as_bytes());
    for slot in schema.slots() {
        let Slot::Property { key, kind } = slot else {
            continue;
        };
        encode_field(record, key, *kind, &mut body)?;
    }
    body.push(ROW_TERMINATOR);
    if body.len() > u32::MAX as usize {
        return Err(CodecError::RowTooLarge {
            model: record.model().to_string(),
            size: body.len(),
        });
    }
    let mut row = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    row.extend_from_slice(&(body.len() as u32).to_le_bytes());
    row.extend_from_slice(&body);
    Ok(row)
}

fn encode_field(record: &Record, key: &str, kind: ElementKind, body: &mut Vec<u8>) -> CodecResult<()> {
    if !kind.is_storable() {
        return Err(CodecError::UnstorableSlot {
            model: record.model().to_string(),
            property: key.to_string(),
            kind,
        });
    }
    let value = record
        .value(key)
        .ok_or_else(|| CodecError::missing_property(record.model(), key))?;
    match (kind, value) {
        (ElementKind::BoolPrimitive, Value::Bool(flag)) => {
            body.push(u8::from(*flag));
        }
        (ElementKind::NumberPrimitive, Value::Number(number)) => {
            body.extend_from_slice(&number.to_le_bytes());
        }
        (ElementKind::StringPrimitive, Value::Text(text)) => {
            if text.len() > u32::MAX as usize {
                return Err(CodecError::RowTooLarge {
                    model: record.model().to_string(),
                    size: text.len(),
                });
            }
            body.extend_from_slice(&(text.len() as u32).to_le_bytes());
            body.extend_from_slice(text.as_bytes());
        }
        (ElementKind::ModelRef, Value::Child(child)) => {
            body.extend_from_slice(child.id().as_bytes());
        }
        (expected, found) => {
            return Err(CodecError::TypeMismatch {
                model: record.model().to_string(),
                property: key.to_string(),
                expected,
                found: found.shape(),
            });
        }
    }
    Ok(())
}

/// Reads the record ID out of a row body without decoding the fields.
///
/// # Errors
///
/// [`CodecError::CorruptRow`] if the body is shorter than an ID.
pub fn row_id(body: &[u8]) -> CodecResult<RecordId> {
    RecordId::from_slice(body.get(..ROW_ID_SIZE).ok_or_else(|| {
        CodecError::corrupt(format!("row body of {} bytes has no id", body.len()))
    })?)
    .ok_or_else(|| CodecError::corrupt("row id is not 16 bytes"))
}

/// Iterator over the length-prefixed rows of a page buffer.
///
/// Yields each row's body (ID through terminator, prefix stripped). Framing
/// is validated as it goes: a truncated prefix, a row extending past the
/// buffer, an impossibly short body, or a missing terminator ends the scan
/// with [`CodecError::CorruptRow`], after which the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct RowReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RowReader<'a> {
    /// Creates a reader over a page buffer.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Returns the byte offset of the next unread row.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    fn fail(&mut self, message: String) -> Option<CodecResult<&'a [u8]>> {
        self.offset = self.data.len();
        Some(Err(CodecError::corrupt(message)))
    }
}

impl<'a> Iterator for RowReader<'a> {
    type Item = CodecResult<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.data[self.offset..];
        if remaining.is_empty() {
            return None;
        }
        if remaining.len() < LENGTH_PREFIX_SIZE {
            return self.fail(format!(
                "truncated length prefix at offset {}",
                self.offset
            ));
        }
        let len = u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]])
            as usize;
        let Some(body) = remaining.get(LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len) else {
            return self.fail(format!(
                "row at offset {} extends past the page end",
                self.offset
            ));
        };
        if body.len() < MIN_ROW_BODY {
            return self.fail(format!("row at offset {} is too short", self.offset));
        }
        if body[body.len() - 1] != ROW_TERMINATOR {
            return self.fail(format!(
                "row at offset {} is missing its terminator",
                self.offset
            ));
        }
        self.offset += LENGTH_PREFIX_SIZE + len;
        Some(Ok(body))
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// A boolean field.
    Bool(bool),
    /// A number field.
    Number(f64),
    /// A string field.
    Text(String),
    /// A model-reference field: the referenced record's ID.
    Reference(RecordId),
}

/// A row decoded back into keyed values.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    /// The record's identity.
    pub id: RecordId,
    /// Field values keyed by slot key.
    pub values: BTreeMap<String, DecodedValue>,
}

/// Decodes a row body against the layout it was written under.
///
/// # Errors
///
/// [`CodecError::UnstorableSlot`] for literal or parameter slots in the
/// layout, and [`CodecError::CorruptRow`] whenever the body disagrees with
/// the layout: fields cut short, non-UTF-8 string bytes, an invalid boolean
/// byte, bytes left over before the terminator, or a missing terminator.
pub fn decode_row(schema: &EncodingSchema, body: &[u8]) -> CodecResult<DecodedRow> {
    if body.len() < MIN_ROW_BODY {
        return Err(CodecError::corrupt(format!(
            "row body of {} bytes is too short",
            body.len()
        )));
    }
    if body[body.len() - 1] != ROW_TERMINATOR {
        return Err(CodecError::corrupt("row body is missing its terminator"));
    }
    let id = row_id(body)?;
    let fields = &body[ROW_ID_SIZE..body.len() - 1];
    let mut cursor = 0usize;
    let mut values = BTreeMap::new();
    for slot in schema.slots() {
        let Slot::Property { key, kind } = slot else {
            continue;
        };
        let value = decode_field(schema.model(), key, *kind, fields, &mut cursor)?;
        values.insert(key.clone(), value);
    }
    if cursor != fields.len() {
        return Err(CodecError::corrupt(format!(
            "{} unexpected byte(s) before the row terminator",
            fields.len() - cursor
        )));
    }
    Ok(DecodedRow { id, values })
}

fn decode_field(
    model: &str,
    key: &str,
    kind: ElementKind,
    fields: &[u8],
    cursor: &mut usize,
) -> CodecResult<DecodedValue> {
    match kind {
        ElementKind::BoolPrimitive => {
            let byte = take(fields, cursor, 1, key)?[0];
            match byte {
                0 => Ok(DecodedValue::Bool(false)),
                1 => Ok(DecodedValue::Bool(true)),
                other => Err(CodecError::corrupt(format!(
                    "invalid boolean byte {other} in field {key}"
                ))),
            }
        }
        ElementKind::NumberPrimitive => {
            let bytes = take(fields, cursor, 8, key)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok(DecodedValue::Number(f64::from_le_bytes(raw)))
        }
        ElementKind::StringPrimitive => {
            let len_bytes = take(fields, cursor, 4, key)?;
            let len =
                u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                    as usize;
            let bytes = take(fields, cursor, len, key)?;
            let text = std::str::from_utf8(bytes).map_err(|_| {
                CodecError::corrupt(format!("non-UTF-8 bytes in string field {key}"))
            })?;
            Ok(DecodedValue::Text(text.to_string()))
        }
        ElementKind::ModelRef => {
            let bytes = take(fields, cursor, ROW_ID_SIZE, key)?;
            let id = RecordId::from_slice(bytes)
                .ok_or_else(|| CodecError::corrupt(format!("bad reference in field {key}")))?;
            Ok(DecodedValue::Reference(id))
        }
        other => Err(CodecError::UnstorableSlot {
            model: model.to_string(),
            property: key.to_string(),
            kind: other,
        }),
    }
}

fn take<'f>(fields: &'f [u8], cursor: &mut usize, len: usize, key: &str) -> CodecResult<&'f [u8]> {
    let end = cursor.checked_add(len).filter(|&end| end <= fields.len());
    let Some(end) = end else {
        return Err(CodecError::corrupt(format!(
            "field {key} is cut short by the row terminator"
        )));
    };
    let bytes = &fields[*cursor..end];
    *cursor = end;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use castdb_schema::{RawDecl, RawGraph, RawType, SchemaBuilder};
    use proptest::prelude::*;

    fn person_schema() -> EncodingSchema {
        let mut graph = RawGraph::new();
        graph
            .declare(
                "Person",
                RawDecl::data()
                    .property("name", RawType::Str)
                    .property("age", RawType::Number),
            )
            .unwrap();
        let mut builder = SchemaBuilder::new(&graph);
        EncodingSchema::initial(&builder.solidify("Person").unwrap())
    }

    #[test]
    fn person_row_lays_out_exactly() {
        let schema = person_schema();
        let id = RecordId::from_bytes([7u8; 16]);
        let person = Record::with_id("Person", id)
            .set("name", "Ada")
            .set("age", 36.0);
        let row = encode_row(&schema, &person).unwrap();
        // body: 16 id + 8 age + 4 string length + 3 text + 1 terminator
        assert_eq!(row.len(), 4 + 32);
        assert_eq!(&row[0..4], &32u32.to_le_bytes());
        assert_eq!(&row[4..20], &[7u8; 16]);
        assert_eq!(&row[20..28], &36.0f64.to_le_bytes());
        assert_eq!(&row[28..32], &3u32.to_le_bytes());
        assert_eq!(&row[32..35], b"Ada");
        assert_eq!(row[35], ROW_TERMINATOR);
    }

    #[test]
    fn rows_decode_back_to_their_values() {
        let schema = person_schema();
        let person = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let row = encode_row(&schema, &person).unwrap();
        let decoded = decode_row(&schema, &row[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded.id, person.id());
        assert_eq!(
            decoded.values["name"],
            DecodedValue::Text("Ada".to_string())
        );
        assert_eq!(decoded.values["age"], DecodedValue::Number(36.0));
    }

    #[test]
    fn empty_strings_encode_as_a_zero_length() {
        let schema = person_schema();
        let person = Record::new("Person").set("name", "").set("age", 0.0);
        let row = encode_row(&schema, &person).unwrap();
        assert_eq!(row.len(), 4 + 16 + 8 + 4 + 0 + 1);
        let decoded = decode_row(&schema, &row[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded.values["name"], DecodedValue::Text(String::new()));
    }

    #[test]
    fn references_encode_as_the_child_id() {
        let mut graph = RawGraph::new();
        graph
            .declare("Person", RawDecl::data().property("name", RawType::Str))
            .unwrap();
        graph
            .declare(
                "Band",
                RawDecl::data().property("leader", RawType::name("Person")),
            )
            .unwrap();
        let mut builder = SchemaBuilder::new(&graph);
        let schema = EncodingSchema::initial(&builder.solidify("Band").unwrap());
        let leader = Record::new("Person").set("name", "Ada");
        let leader_id = leader.id();
        let band = Record::new("Band").set("leader", leader);
        let row = encode_row(&schema, &band).unwrap();
        assert_eq!(row.len(), 4 + 16 + 16 + 1);
        assert_eq!(&row[20..36], leader_id.as_bytes());
        let decoded = decode_row(&schema, &row[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded.values["leader"], DecodedValue::Reference(leader_id));
    }

    #[test]
    fn missing_properties_fail_to_encode() {
        let schema = person_schema();
        let person = Record::new("Person").set("name", "Ada");
        let err = encode_row(&schema, &person).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MissingProperty { property, .. } if property == "age"
        ));
    }

    #[test]
    fn mismatched_values_fail_to_encode() {
        let schema = person_schema();
        let person = Record::new("Person").set("name", "Ada").set("age", "old");
        let err = encode_row(&schema, &person).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch { property, found: "text", .. } if property == "age"
        ));
    }

    #[test]
    fn literal_slots_refuse_to_encode() {
        let schema = EncodingSchema::from_slots(
            "Tagged",
            vec![
                Slot::Identifier,
                Slot::Property {
                    key: "kind".to_string(),
                    kind: ElementKind::StringLiteral,
                },
            ],
        );
        let record = Record::new("Tagged").set("kind", "song");
        let err = encode_row(&schema, &record).unwrap_err();
        assert!(matches!(err, CodecError::UnstorableSlot { .. }));
        let body = [&[0u8; 16][..], &[ROW_TERMINATOR]].concat();
        let err = decode_row(&schema, &body).unwrap_err();
        assert!(matches!(err, CodecError::UnstorableSlot { .. }));
    }

    #[test]
    fn row_reader_walks_consecutive_rows() {
        let schema = person_schema();
        let a = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let b = Record::new("Person").set("name", "Grace").set("age", 45.0);
        let mut page = encode_row(&schema, &a).unwrap();
        page.extend(encode_row(&schema, &b).unwrap());
        let bodies: Vec<&[u8]> = RowReader::new(&page).map(Result::unwrap).collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(row_id(bodies[0]).unwrap(), a.id());
        assert_eq!(row_id(bodies[1]).unwrap(), b.id());
    }

    #[test]
    fn row_reader_on_an_empty_page_yields_nothing() {
        assert_eq!(RowReader::new(&[]).count(), 0);
    }

    #[test]
    fn row_reader_reports_truncated_prefixes() {
        let mut reader = RowReader::new(&[1, 2]);
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, CodecError::CorruptRow { .. }));
        assert!(reader.next().is_none());
    }

    #[test]
    fn row_reader_reports_rows_past_the_end() {
        let schema = person_schema();
        let a = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let mut page = encode_row(&schema, &a).unwrap();
        page.truncate(page.len() - 5);
        let mut reader = RowReader::new(&page);
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, CodecError::CorruptRow { .. }));
        assert!(reader.next().is_none());
    }

    #[test]
    fn row_reader_requires_the_terminator() {
        let schema = person_schema();
        let a = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let mut page = encode_row(&schema, &a).unwrap();
        let last = page.len() - 1;
        page[last] = 0xFF;
        let mut reader = RowReader::new(&page);
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, CodecError::CorruptRow { .. }));
    }

    #[test]
    fn decode_rejects_bad_boolean_bytes() {
        let mut graph = RawGraph::new();
        graph
            .declare("Flag", RawDecl::data().property("on", RawType::Bool))
            .unwrap();
        let mut builder = SchemaBuilder::new(&graph);
        let schema = EncodingSchema::initial(&builder.solidify("Flag").unwrap());
        let record = Record::new("Flag").set("on", true);
        let row = encode_row(&schema, &record).unwrap();
        let mut body = row[LENGTH_PREFIX_SIZE..].to_vec();
        body[ROW_ID_SIZE] = 7;
        let err = decode_row(&schema, &body).unwrap_err();
        assert!(matches!(err, CodecError::CorruptRow { .. }));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let schema = person_schema();
        let person = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let row = encode_row(&schema, &person).unwrap();
        let mut body = row[LENGTH_PREFIX_SIZE..].to_vec();
        let last = body.len() - 1;
        body.insert(last, 0x00);
        let err = decode_row(&schema, &body).unwrap_err();
        assert!(matches!(err, CodecError::CorruptRow { .. }));
    }

    #[test]
    fn decode_rejects_non_utf8_strings() {
        let schema = person_schema();
        let person = Record::new("Person").set("name", "Ada").set("age", 36.0);
        let row = encode_row(&schema, &person).unwrap();
        let mut body = row[LENGTH_PREFIX_SIZE..].to_vec();
        // "Ada" sits right before the terminator.
        let text_start = body.len() - 4;
        body[text_start] = 0xFF;
        let err = decode_row(&schema, &body).unwrap_err();
        assert!(matches!(err, CodecError::CorruptRow { .. }));
    }

    proptest! {
        #[test]
        fn arbitrary_person_rows_round_trip(
            name in "\\PC{0,40}",
            age in -1.0e12f64..1.0e12,
            alive in proptest::bool::ANY,
        ) {
            let mut graph = RawGraph::new();
            graph
                .declare(
                    "Person",
                    RawDecl::data()
                        .property("name", RawType::Str)
                        .property("age", RawType::Number)
                        .property("alive", RawType::Bool),
                )
                .unwrap();
            let mut builder = SchemaBuilder::new(&graph);
            let schema = EncodingSchema::initial(&builder.solidify("Person").unwrap());
            let person = Record::new("Person")
                .set("name", name.clone())
                .set("age", age)
                .set("alive", alive);
            let row = encode_row(&schema, &person).unwrap();
            let decoded = decode_row(&schema, &row[LENGTH_PREFIX_SIZE..]).unwrap();
            prop_assert_eq!(decoded.id, person.id());
            prop_assert_eq!(&decoded.values["name"], &DecodedValue::Text(name));
            prop_assert_eq!(&decoded.values["age"], &DecodedValue::Number(age));
            prop_assert_eq!(&decoded.values["alive"], &DecodedValue::Bool(alive));
        }
    }
}

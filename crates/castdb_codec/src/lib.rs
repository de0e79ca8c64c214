//! # CastDB Codec
//!
//! Binary row encoding and decoding for CastDB records.
//!
//! Rows are positional: an [`EncodingSchema`](castdb_schema::EncodingSchema)
//! fixes the slot order, and a row is nothing but a length prefix, the
//! record's 16-byte ID, one field per slot, and a terminator byte. That
//! keeps pages scannable without consulting a schema and keeps every field
//! mandatory.
//!
//! ## Field encoding
//!
//! - Booleans: one byte, `0` or `1`
//! - Numbers: little-endian `f64`
//! - Strings: `u32` little-endian byte count, then UTF-8 bytes
//! - References: the referenced record's 16-byte ID
//!
//! ## Usage
//!
//! ```
//! use castdb_codec::{encode_tree, Record};
//! use castdb_schema::{EncodingCatalog, RawDecl, RawGraph, RawType, SchemaBuilder};
//!
//! let mut graph = RawGraph::new();
//! graph
//!     .declare(
//!         "Person",
//!         RawDecl::data()
//!             .property("name", RawType::Str)
//!             .property("age", RawType::Number),
//!     )
//!     .unwrap();
//! let mut builder = SchemaBuilder::new(&graph);
//! let catalog = EncodingCatalog::initial_for(&builder.solidify_all().unwrap());
//!
//! let person = Record::new("Person").set("name", "Ada").set("age", 36.0);
//! let (deferred, this) = encode_tree(&catalog, &person).unwrap();
//! assert!(deferred.is_empty());
//! assert_eq!(this.model(), "Person");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod encoder;
mod error;
mod record;
mod row;

pub use encoder::{encode_tree, RowOperation};
pub use error::{CodecError, CodecResult};
pub use record::{PageIndex, Record, RecordId, RecordStatus, Value};
pub use row::{
    decode_row, encode_row, row_id, DecodedRow, DecodedValue, RowReader, LENGTH_PREFIX_SIZE,
    MIN_ROW_BODY, ROW_ID_SIZE, ROW_TERMINATOR,
};

//! # CastDB Schema
//!
//! Model graph derivation, solidification, and encoding layouts for CastDB.
//!
//! Applications describe their record shapes as a [`RawGraph`] of declared
//! models: plain data models, concrete templates, and generic templates.
//! This crate turns that graph into byte-layout decisions in three stages:
//!
//! 1. **Derivation** - [`SchemaBuilder`] classifies every declared property
//!    into an [`Element`] and memoizes one [`Model`] per symbol, so shared
//!    and recursive references stay cheap and terminate.
//! 2. **Solidification** - templates are merged and generic parameters
//!    substituted until a [`SolidModel`] holds nothing but primitives,
//!    literals, and model references.
//! 3. **Encoding** - [`EncodingSchema`] fixes the slot order rows are
//!    written in, and evolves append-only as models change so old rows stay
//!    decodable.
//!
//! ## Example
//!
//! ```
//! use castdb_schema::{EncodingSchema, RawDecl, RawGraph, RawType, SchemaBuilder};
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
//!
//! let mut builder = SchemaBuilder::new(&graph);
//! let solid = builder.solidify("Person").unwrap();
//! let schema = EncodingSchema::initial(&solid);
//! assert_eq!(schema.slots().len(), 3); // __id, age, name
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod encoding;
mod error;
mod graph;
mod model;
mod solidify;

pub use builder::{BuilderStats, SchemaBuilder};
pub use encoding::{
    EncodingCatalog, EncodingSchema, Slot, CATALOG_MAGIC, CATALOG_VERSION, IDENTIFIER_SLOT_KEY,
};
pub use error::{SchemaError, SchemaResult};
pub use graph::{RawBase, RawDecl, RawGraph, RawParameter, RawType};
pub use model::{Element, ElementKind, Model, ModelKind, TemplateRef};
pub use solidify::{ArgumentEnv, SolidModel};

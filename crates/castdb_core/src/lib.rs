//! # CastDB Core
//!
//! Embedded schema-driven record store for CastDB.
//!
//! This crate ties the other CastDB crates together:
//! - model layouts come from `castdb_schema`
//! - rows and record trees encode through `castdb_codec`
//! - pages persist through a `castdb_storage` backend
//!
//! A [`Store`] owns the store directory, the encoding catalog, and page
//! placement. Records are written as whole trees - new children land
//! before the rows that reference them, so the pages never hold a
//! reference to a row that does not exist, even when a write stops
//! partway. There is no cross-record transaction beyond that ordering.
//!
//! ## Example
//!
//! ```rust
//! use castdb_codec::Record;
//! use castdb_core::Store;
//! use castdb_schema::{RawDecl, RawGraph, RawType, SchemaBuilder};
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
//! let person = builder.solidify("Person").unwrap();
//!
//! let mut store = Store::open_in_memory();
//! store.register_model(&person).unwrap();
//!
//! let ada = Record::new("Person").set("name", "Ada").set("age", 36.0);
//! let filed = store.write(&ada).unwrap();
//! assert!(!filed.status().is_new());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod pages;
mod store;
mod writer;

pub use config::Config;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use pages::PageStore;
pub use store::Store;

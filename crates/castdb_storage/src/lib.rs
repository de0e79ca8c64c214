//! # CastDB Storage
//!
//! Page storage backends for CastDB.
//!
//! This crate provides the lowest-level storage abstraction for CastDB.
//! Backends are **opaque byte stores** grouped into pages per model - they
//! do not interpret the row data they hold.
//!
//! ## Design Principles
//!
//! - Pages are append-only; rewrites go through a stage-then-promote
//!   protocol whose promotion step is atomic
//! - No knowledge of CastDB row formats or schemas
//! - Must be `Send + Sync`; reads take `&self`, writes `&mut self`
//! - CastDB core owns all format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent storage, one directory per model
//!
//! ## Example
//!
//! ```rust
//! use castdb_storage::{InMemoryBackend, PageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append_page("Person", 0, b"hello world").unwrap();
//! let data = backend.read_page("Person", 0).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::PageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

//! In-memory page backend for testing.

use std::collections::BTreeMap;

use crate::backend::PageBackend;
use crate::error::{StorageError, StorageResult};

/// An in-memory page backend.
///
/// Pages and staged images live in plain maps keyed by model and page
/// index. Suitable for unit tests, integration tests, and ephemeral stores
/// that never touch disk. Semantics match [`FileBackend`](crate::FileBackend)
/// exactly, staging protocol included.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    pages: BTreeMap<(String, u64), Vec<u8>>,
    staged: BTreeMap<(String, u64), Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every page and staged image.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.staged.clear();
    }
}

impl PageBackend for InMemoryBackend {
    fn head_page(&self, model: &str) -> StorageResult<Option<u64>> {
        Ok(self
            .pages
            .keys()
            .filter(|(m, _)| m == model)
            .map(|(_, page)| *page)
            .max())
    }

    fn page_len(&self, model: &str, page: u64) -> StorageResult<u64> {
        Ok(self
            .pages
            .get(&(model.to_string(), page))
            .map_or(0, |data| data.len() as u64))
    }

    fn read_page(&self, model: &str, page: u64) -> StorageResult<Vec<u8>> {
        self.pages
            .get(&(model.to_string(), page))
            .cloned()
            .ok_or_else(|| StorageError::page_missing(model, page))
    }

    fn append_page(&mut self, model: &str, page: u64, data: &[u8]) -> StorageResult<()> {
        self.pages
            .entry((model.to_string(), page))
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn stage_page(&mut self, model: &str, page: u64, data: &[u8]) -> StorageResult<()> {
        self.staged.insert((model.to_string(), page), data.to_vec());
        Ok(())
    }

    fn promote_staged(&mut self, model: &str, page: u64) -> StorageResult<()> {
        let image = self
            .staged
            .remove(&(model.to_string(), page))
            .ok_or_else(|| StorageError::no_staged_page(model, page))?;
        self.pages.insert((model.to_string(), page), image);
        Ok(())
    }

    fn discard_staged(&mut self, model: &str, page: u64) -> StorageResult<()> {
        self.staged
            .remove(&(model.to_string(), page))
            .map(|_| ())
            .ok_or_else(|| StorageError::no_staged_page(model, page))
    }

    fn sweep_staged(&mut self) -> StorageResult<usize> {
        let swept = self.staged.len();
        self.staged.clear();
        Ok(swept)
    }

    fn sync(&mut self, model: &str, page: u64) -> StorageResult<()> {
        if self.pages.contains_key(&(model.to_string(), page)) {
            Ok(())
        } else {
            Err(StorageError::page_missing(model, page))
        }
    }
}

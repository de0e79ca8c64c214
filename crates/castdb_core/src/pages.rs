//! Row placement on pages: appends, rotation, and in-place rewrites.
//!
//! A [`PageStore`] sits between encoded row operations and a raw
//! [`PageBackend`]. It decides which page a new row lands on (rotating to a
//! fresh page once the head fills up) and rewrites existing rows through
//! the backend's stage-then-promote protocol, so a page is either fully
//! old or fully new, never half-rewritten.

use castdb_codec::{row_id, PageIndex, RecordId, RowOperation, RowReader};
use castdb_storage::PageBackend;
use tracing::debug;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};

/// Places encoded rows onto the pages of a backend.
///
/// The store itself is stateless between calls: head pages and lengths are
/// asked of the backend each time, so two stores over the same backend
/// (e.g. across a reopen) agree on placement.
#[derive(Debug)]
pub struct PageStore<B> {
    backend: B,
    rotation_threshold: u64,
    sync_on_write: bool,
}

impl<B: PageBackend> PageStore<B> {
    /// Creates a page store over a backend.
    pub fn new(backend: B, config: &Config) -> Self {
        Self {
            backend,
            rotation_threshold: config.page_rotation_threshold,
            sync_on_write: config.sync_on_write,
        }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Deletes staged page images left behind by an interrupted rewrite.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot enumerate or delete images.
    pub fn sweep_staged(&mut self) -> CoreResult<usize> {
        Ok(self.backend.sweep_staged()?)
    }

    /// Appends a framed row to the model's head page and returns the page
    /// it landed on.
    ///
    /// A model without pages starts at page 0. A head page that has
    /// reached the rotation threshold stops receiving rows; the row lands
    /// on the next page instead. Rows are never split across pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot append or sync.
    pub fn create(&mut self, model: &str, row: &[u8]) -> CoreResult<PageIndex> {
        let page = match self.backend.head_page(model)? {
            None => 0,
            Some(head) if self.backend.page_len(model, head)? >= self.rotation_threshold => {
                debug!("Model {} rotates to page {}", model, head + 1);
                head + 1
            }
            Some(head) => head,
        };
        self.backend.append_page(model, page, row)?;
        if self.sync_on_write {
            self.backend.sync(model, page)?;
        }
        Ok(PageIndex::new(page))
    }

    /// Replaces one record's row on a page, leaving every other row
    /// byte-identical and in its original order.
    ///
    /// The page is rebuilt row by row into a staged image, which is then
    /// promoted atomically. Until promotion the original page is
    /// untouched, so a failure partway leaves no visible change.
    ///
    /// # Errors
    ///
    /// [`CoreError::RowNotFound`] if the page holds no row for `id`, a
    /// storage error if the page is missing entirely, and a codec error if
    /// the page content does not scan as rows.
    pub fn update(
        &mut self,
        model: &str,
        page: PageIndex,
        id: RecordId,
        row: &[u8],
    ) -> CoreResult<()> {
        let current = self.backend.read_page(model, page.as_u64())?;
        let mut rebuilt = Vec::with_capacity(current.len());
        let mut replaced = false;
        for body in RowReader::new(&current) {
            let body = body?;
            if row_id(body)? == id {
                rebuilt.extend_from_slice(row);
                replaced = true;
            } else {
                rebuilt.extend_from_slice(&(body.len() as u32).to_le_bytes());
                rebuilt.extend_from_slice(body);
            }
        }
        if !replaced {
            return Err(CoreError::row_not_found(model, page, id));
        }
        self.backend.stage_page(model, page.as_u64(), &rebuilt)?;
        self.backend.promote_staged(model, page.as_u64())?;
        Ok(())
    }

    /// Applies one row operation and returns the page it touched.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`create`](Self::create) and
    /// [`update`](Self::update).
    pub fn apply(&mut self, op: &RowOperation) -> CoreResult<PageIndex> {
        match op {
            RowOperation::Create { model, row, .. } => self.create(model, row),
            RowOperation::Update {
                model,
                page,
                id,
                row,
            } => {
                self.update(model, *page, *id, row)?;
                Ok(*page)
            }
        }
    }

    /// Finds one record's row body on a page.
    ///
    /// # Errors
    ///
    /// [`CoreError::RowNotFound`] if no row on the page carries `id`, plus
    /// storage and codec errors for a missing or unscannable page.
    pub fn find_row(&self, model: &str, page: PageIndex, id: RecordId) -> CoreResult<Vec<u8>> {
        let current = self.backend.read_page(model, page.as_u64())?;
        for body in RowReader::new(&current) {
            let body = body?;
            if row_id(body)? == id {
                return Ok(body.to_vec());
            }
        }
        Err(CoreError::row_not_found(model, page, id))
    }

    /// Searches every page of a model, in index order, for a record's row.
    ///
    /// For callers that do not know the page a record was filed on.
    /// Returns the page and body of the first match, or `None` when no
    /// page holds the ID.
    ///
    /// # Errors
    ///
    /// Returns storage and codec errors for unreadable or unscannable
    /// pages.
    pub fn locate(&self, model: &str, id: RecordId) -> CoreResult<Option<(PageIndex, Vec<u8>)>> {
        let Some(head) = self.backend.head_page(model)? else {
            return Ok(None);
        };
        for page in 0..=head {
            let current = self.backend.read_page(model, page)?;
            for body in RowReader::new(&current) {
                let body = body?;
                if row_id(body)? == id {
                    return Ok(Some((PageIndex::new(page), body.to_vec())));
                }
            }
        }
        Ok(None)
    }

    /// Reads every row body of a model, page by page in index order.
    ///
    /// Returns each body paired with the page it lives on. A model without
    /// pages yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns storage and codec errors for unreadable or unscannable
    /// pages.
    pub fn scan_model(&self, model: &str) -> CoreResult<Vec<(PageIndex, Vec<u8>)>> {
        let Some(head) = self.backend.head_page(model)? else {
            return Ok(Vec::new());
        };
        let mut rows = Vec::new();
        for page in 0..=head {
            let current = self.backend.read_page(model, page)?;
            for body in RowReader::new(&current) {
                rows.push((PageIndex::new(page), body?.to_vec()));
            }
        }
        Ok(rows)
    }
}

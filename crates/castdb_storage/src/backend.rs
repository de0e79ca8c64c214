//! Page backend trait definition.

use crate::error::StorageResult;

/// A store of append-only pages grouped by model.
///
/// Backends are **opaque byte stores**: they know nothing about rows,
/// records, or schemas. A page is addressed by a model name and a page
/// index, and only ever changes in two ways:
///
/// - bytes are appended to it, or
/// - a staged replacement image is promoted over it in one atomic step.
///
/// The staging protocol is how callers rewrite a page without ever exposing
/// a half-written file: [`stage_page`](PageBackend::stage_page) writes the
/// complete replacement next to the original,
/// [`promote_staged`](PageBackend::promote_staged) swaps it in atomically,
/// and [`sweep_staged`](PageBackend::sweep_staged) clears out replacements
/// that were staged but never promoted, which is what a crash between the
/// two calls leaves behind.
///
/// # Thread Safety
///
/// Backends must be `Send + Sync`. Reads take `&self`; all mutation goes
/// through `&mut self`, so a backend shared behind a lock needs no interior
/// locking of its own.
pub trait PageBackend: Send + Sync {
    /// Returns the highest page index of `model`, or `None` if the model
    /// has no pages yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot enumerate pages.
    fn head_page(&self, model: &str) -> StorageResult<Option<u64>>;

    /// Returns the byte length of a page.
    ///
    /// A page that was never written counts as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be determined.
    fn page_len(&self, model: &str, page: u64) -> StorageResult<u64>;

    /// Reads the full content of a page.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PageMissing`](crate::StorageError::PageMissing)
    /// if the page does not exist.
    fn read_page(&self, model: &str, page: u64) -> StorageResult<Vec<u8>>;

    /// Appends bytes to a page, creating it (and its model) if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be written.
    fn append_page(&mut self, model: &str, page: u64, data: &[u8]) -> StorageResult<()>;

    /// Stages a complete replacement image for a page.
    ///
    /// Any previously staged replacement for the same page is truncated
    /// first, so a failed update can simply be retried. Staging does not
    /// touch the original page.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be written durably.
    fn stage_page(&mut self, model: &str, page: u64, data: &[u8]) -> StorageResult<()>;

    /// Atomically replaces a page with its staged image.
    ///
    /// This is the commit point of a rewrite: before it the original page
    /// is untouched, after it the replacement is fully in place.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoStagedPage`](crate::StorageError::NoStagedPage)
    /// if nothing is staged for the page.
    fn promote_staged(&mut self, model: &str, page: u64) -> StorageResult<()>;

    /// Drops the staged image for a page without promoting it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoStagedPage`](crate::StorageError::NoStagedPage)
    /// if nothing is staged for the page.
    fn discard_staged(&mut self, model: &str, page: u64) -> StorageResult<()>;

    /// Deletes every staged image in the backend and returns how many were
    /// removed.
    ///
    /// Run at open time: staged images found then are leftovers of an
    /// interrupted rewrite and must not shadow future staging.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot enumerate or delete images.
    fn sweep_staged(&mut self) -> StorageResult<usize>;

    /// Forces a page's appended bytes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PageMissing`](crate::StorageError::PageMissing)
    /// if the page does not exist.
    fn sync(&mut self, model: &str, page: u64) -> StorageResult<()>;
}

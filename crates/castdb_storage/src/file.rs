//! File-based page backend.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::backend::PageBackend;
use crate::error::{StorageError, StorageResult};

/// Extension of a settled page file.
const PAGE_EXTENSION: &str = ".data";

/// Suffix marking a staged replacement image.
const STAGED_SUFFIX: &str = "__NEXT";

/// A page backend rooted at a data directory.
///
/// Pages live at `<root>/<model>/<page>.data`; a staged replacement for a
/// page lives next to it as `<page>.data__NEXT` until promoted. Files are
/// opened per operation and never held across calls, so a backend value is
/// cheap and carries no open handles.
///
/// # Example
///
/// ```no_run
/// use castdb_storage::{FileBackend, PageBackend};
///
/// let mut backend = FileBackend::new("/var/lib/castdb/data");
/// backend.append_page("Person", 0, b"row bytes").unwrap();
/// let content = backend.read_page("Person", 0).unwrap();
/// assert_eq!(content, b"row bytes");
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `root`.
    ///
    /// The directory itself is not created here; it appears when the first
    /// page is written.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the data directory this backend is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_dir(&self, model: &str) -> PathBuf {
        self.root.join(model)
    }

    fn page_path(&self, model: &str, page: u64) -> PathBuf {
        self.model_dir(model).join(format!("{page}{PAGE_EXTENSION}"))
    }

    fn staged_path(&self, model: &str, page: u64) -> PathBuf {
        self.model_dir(model)
            .join(format!("{page}{PAGE_EXTENSION}{STAGED_SUFFIX}"))
    }
}

impl PageBackend for FileBackend {
    fn head_page(&self, model: &str) -> StorageResult<Option<u64>> {
        let entries = match fs::read_dir(self.model_dir(model)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut head = None;
        for entry in entries {
            let entry = entry?;
            let Some(page) = parse_page_name(&entry.file_name()) else {
                continue;
            };
            head = Some(head.map_or(page, |current: u64| current.max(page)));
        }
        Ok(head)
    }

    fn page_len(&self, model: &str, page: u64) -> StorageResult<u64> {
        match fs::metadata(self.page_path(model, page)) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn read_page(&self, model: &str, page: u64) -> StorageResult<Vec<u8>> {
        match fs::read(self.page_path(model, page)) {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::page_missing(model, page))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn append_page(&mut self, model: &str, page: u64, data: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(self.model_dir(model))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.page_path(model, page))?;
        file.write_all(data)?;
        Ok(())
    }

    fn stage_page(&mut self, model: &str, page: u64, data: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(self.model_dir(model))?;
        // File::create truncates, so a stray image from an earlier failed
        // rewrite never leaks into this one.
        let mut file = File::create(self.staged_path(model, page))?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn promote_staged(&mut self, model: &str, page: u64) -> StorageResult<()> {
        let staged = self.staged_path(model, page);
        let settled = self.page_path(model, page);
        match fs::rename(&staged, &settled) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::no_staged_page(model, page));
            }
            Err(err) => return Err(err.into()),
        }
        sync_dir(&self.model_dir(model))?;
        Ok(())
    }

    fn discard_staged(&mut self, model: &str, page: u64) -> StorageResult<()> {
        match fs::remove_file(self.staged_path(model, page)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::no_staged_page(model, page))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn sweep_staged(&mut self) -> StorageResult<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut swept = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            for file in fs::read_dir(entry.path())? {
                let file = file?;
                let name = file.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                if name.ends_with(STAGED_SUFFIX) {
                    fs::remove_file(file.path())?;
                    swept += 1;
                }
            }
        }
        Ok(swept)
    }

    fn sync(&mut self, model: &str, page: u64) -> StorageResult<()> {
        let file = match File::open(self.page_path(model, page)) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::page_missing(model, page));
            }
            Err(err) => return Err(err.into()),
        };
        file.sync_all()?;
        Ok(())
    }
}

/// Parses `<page>.data` file names; staged images and foreign files yield
/// `None`.
fn parse_page_name(name: &std::ffi::OsStr) -> Option<u64> {
    name.to_str()?
        .strip_suffix(PAGE_EXTENSION)?
        .parse::<u64>()
        .ok()
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

//! Store directory management.
//!
//! This module handles the file system layout for CastDB:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK        # Advisory lock for single-writer
//! ├─ ENCODINGS   # Persisted model layouts
//! └─ data/       # Page files, one subdirectory per model
//! ```
//!
//! The LOCK file ensures only one process can write to the store at a time.
//! The ENCODINGS file persists the encoding catalog across restarts, so
//! rows written under a layout stay readable after reopening. Page files
//! live under `data/` rather than the root so model names can never
//! collide with the store's own files.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use castdb_schema::EncodingCatalog;
use fs2::FileExt;

use crate::error::{CoreError, CoreResult};

/// File names within the store directory.
const ENCODINGS_FILE: &str = "ENCODINGS";
const LOCK_FILE: &str = "LOCK";
/// Directory holding page files.
const DATA_DIR: &str = "data";
/// Temporary file for atomic catalog writes.
const ENCODINGS_TEMP: &str = "ENCODINGS.tmp";

/// Manages the store directory structure and file locking.
///
/// # Thread Safety
///
/// The `StoreDir` holds an exclusive lock on the store directory. Only one
/// `StoreDir` instance can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Non-blocking: a held lock means another live store.
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        fs::create_dir_all(path.join(DATA_DIR))?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the data directory holding page files.
    ///
    /// Each model gets its own subdirectory here, with pages named
    /// `<index>.data`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.path.join(DATA_DIR)
    }

    /// Returns the path to the ENCODINGS file.
    #[must_use]
    pub fn encodings_path(&self) -> PathBuf {
        self.path.join(ENCODINGS_FILE)
    }

    /// Checks if this is a new store with no persisted layouts.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        !self.encodings_path().exists()
    }

    /// Loads the encoding catalog from disk.
    ///
    /// Returns `None` if the ENCODINGS file doesn't exist yet (new store).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not decode.
    pub fn load_catalog(&self) -> CoreResult<Option<EncodingCatalog>> {
        let encodings_path = self.encodings_path();

        if !encodings_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&encodings_path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if data.is_empty() {
            return Ok(None);
        }

        let catalog = EncodingCatalog::decode(&data)?;
        Ok(Some(catalog))
    }

    /// Saves the encoding catalog to disk atomically.
    ///
    /// Uses write-then-rename for crash safety:
    /// 1. Write to temporary file
    /// 2. Sync temporary file to disk
    /// 3. Rename temporary file to ENCODINGS
    /// 4. Fsync the directory so the rename is durable
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the previous ENCODINGS file is
    /// untouched until the rename.
    pub fn save_catalog(&self, catalog: &EncodingCatalog) -> CoreResult<()> {
        let encodings_path = self.encodings_path();
        let temp_path = self.path.join(ENCODINGS_TEMP);

        let data = catalog.encode()?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &encodings_path)?;

        self.sync_directory()?;

        Ok(())
    }

    /// Syncs the store directory so metadata updates are durable.
    ///
    /// On Windows, directory fsync is not supported; the NTFS journal
    /// covers metadata durability there, so the call is skipped.
    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castdb_schema::{RawDecl, RawGraph, RawType, SchemaBuilder};
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        assert!(!store_path.exists());

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        assert!(dir.data_dir().is_dir());

        drop(dir);
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("nonexistent");

        let result = StoreDir::open(&store_path, false);
        assert!(result.is_err());
        assert!(!store_path.exists());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked_store");

        let _dir1 = StoreDir::open(&store_path, true).unwrap();

        let result = StoreDir::open(&store_path, true);
        assert!(matches!(result, Err(CoreError::StoreLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen_store");

        {
            let _dir = StoreDir::open(&store_path, true).unwrap();
        }

        let _dir2 = StoreDir::open(&store_path, true).unwrap();
    }

    #[test]
    fn catalog_round_trip() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("catalog_store");

        let dir = StoreDir::open(&store_path, true).unwrap();

        assert!(dir.load_catalog().unwrap().is_none());
        assert!(dir.is_new_store());

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
        let solid = builder.solidify("Person").unwrap();
        let catalog = EncodingCatalog::initial_for([&solid]);

        dir.save_catalog(&catalog).unwrap();
        assert!(!dir.is_new_store());

        let loaded = dir.load_catalog().unwrap().unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn empty_encodings_file_counts_as_new() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("empty_store");

        let dir = StoreDir::open(&store_path, true).unwrap();
        fs::write(dir.encodings_path(), b"").unwrap();

        assert!(dir.load_catalog().unwrap().is_none());
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("paths_store");

        let dir = StoreDir::open(&store_path, true).unwrap();

        assert_eq!(dir.path(), store_path);
        assert_eq!(dir.data_dir(), store_path.join("data"));
        assert_eq!(dir.encodings_path(), store_path.join("ENCODINGS"));
    }
}

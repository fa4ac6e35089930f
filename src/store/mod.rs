//! Torrent file store.
//!
//! The store is a single flat directory. A file's presence under its name is the only
//! record that it has been fetched; there is no index or manifest next to it.
//!
//! Writes go through [`PendingFile`]: bytes land in a hidden temporary file in the store
//! root and are only published under their final name by [`PendingFile::commit`]. A
//! pending file that is dropped without being committed deletes its temporary file, so a
//! failed download can never look like a stored one.

use crate::error::StoreError;
use crate::extract::has_torrent_suffix;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Suffix of in-progress temporary files
const PARTIAL_SUFFIX: &str = ".part";

/// Longest prefix of the final name carried into a temporary file name
const TEMP_NAME_PREFIX_BYTES: usize = 64;

/// Distinguishes temporary files created by the same process
static PENDING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A file present in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    /// File name (also the last segment of its download URL)
    pub name: String,

    /// Size on disk
    pub size_bytes: u64,

    /// Last modification time, if the platform reports one
    pub modified: Option<DateTime<Utc>>,
}

/// Directory of downloaded torrent files
#[derive(Clone, Debug)]
pub struct Store {
    root: Arc<PathBuf>,
}

impl Store {
    /// Open the store at `root`, creating the directory (and its parents) if needed
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io("create directory", &root, e))?;
        debug!(root = %root.display(), "Opened torrent store");
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check whether a file with this name is present
    ///
    /// Only the name is compared, never the content.
    pub async fn exists(&self, name: &str) -> StoreResult<bool> {
        let path = self.path_for(name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io("stat", path, e))
    }

    /// Start writing a new file named `name`
    ///
    /// # Errors
    /// - [`StoreError::InvalidName`] if `name` is not a single safe path component
    /// - [`StoreError::AlreadyExists`] if the name is already present
    /// - [`StoreError::Io`] if the temporary file cannot be created
    pub async fn create(&self, name: &str) -> StoreResult<PendingFile> {
        let final_path = self.path_for(name)?;
        if self.exists(name).await? {
            return Err(StoreError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let temp_path = self.root.join(temp_file_name(
            name,
            PENDING_COUNTER.fetch_add(1, Ordering::Relaxed),
        ));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(|e| StoreError::io("create", &temp_path, e))?;

        Ok(PendingFile {
            name: name.to_string(),
            final_path,
            temp_path,
            file: Some(file),
            committed: false,
        })
    }

    /// Delete a file from the store
    ///
    /// Best effort: failures are logged and otherwise ignored.
    pub async fn remove(&self, name: &str) {
        match self.path_for(name) {
            Ok(path) => remove_quietly(&path).await,
            Err(e) => warn!(error = %e, "Refusing to remove file outside the store"),
        }
    }

    /// List the torrent files currently in the store
    ///
    /// Directories, non-`.torrent` files and in-progress writes are left out. Entries
    /// come back in directory enumeration order.
    pub async fn list(&self) -> StoreResult<Vec<StoredFile>> {
        let mut entries = fs::read_dir(self.root.as_path())
            .await
            .map_err(|e| StoreError::io("read directory", self.root.as_path(), e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("read directory", self.root.as_path(), e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if !has_torrent_suffix(&name) {
                continue;
            }

            // The file may vanish between read_dir and metadata (operator cleanup)
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(name = %name, error = %e, "Skipping unreadable store entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            files.push(StoredFile {
                name,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        Ok(files)
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        if !is_valid_name(name) {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(name))
    }
}

/// A file being written into the store
///
/// Dropping it without calling [`commit`](PendingFile::commit) discards everything
/// written so far.
#[derive(Debug)]
pub struct PendingFile {
    name: String,
    final_path: PathBuf,
    temp_path: PathBuf,
    file: Option<fs::File>,
    committed: bool,
}

impl PendingFile {
    /// Name the file will be published under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append bytes to the file
    pub async fn write(&mut self, bytes: &[u8]) -> StoreResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(closed(&self.temp_path));
        };
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io("write", &self.temp_path, e))
    }

    /// Flush the data to disk and publish the file under its final name
    ///
    /// Publishing never overwrites: if another writer got there first this fails with
    /// [`StoreError::AlreadyExists`] and the temporary file is discarded.
    pub async fn commit(mut self) -> StoreResult<PathBuf> {
        let Some(file) = self.file.as_mut() else {
            return Err(closed(&self.temp_path));
        };
        file.flush()
            .await
            .map_err(|e| StoreError::io("flush", &self.temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io("sync", &self.temp_path, e))?;
        self.file = None;

        match fs::hard_link(&self.temp_path, &self.final_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    name: self.name.clone(),
                });
            }
            Err(e) => {
                // Some file systems cannot hard link; fall back to a checked rename
                debug!(name = %self.name, error = %e, "Hard link failed, renaming instead");
                if fs::try_exists(&self.final_path).await.unwrap_or(false) {
                    return Err(StoreError::AlreadyExists {
                        name: self.name.clone(),
                    });
                }
                fs::rename(&self.temp_path, &self.final_path)
                    .await
                    .map_err(|e| StoreError::io("rename", &self.final_path, e))?;
                self.committed = true;
                return Ok(self.final_path.clone());
            }
        }

        self.committed = true;
        remove_quietly(&self.temp_path).await;
        Ok(self.final_path.clone())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file = None;
        // Drop cannot await; a single unlink is short enough to run on the runtime thread
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => debug!(name = %self.name, "Discarded unfinished download"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.temp_path.display(),
                error = %e,
                "Failed to remove unfinished download"
            ),
        }
    }
}

fn closed(path: &Path) -> StoreError {
    StoreError::io("write", path, std::io::Error::other("pending file already closed"))
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Hidden temporary name for `name`, short enough to be valid whenever `name` is
fn temp_file_name(name: &str, counter: u64) -> String {
    let mut end = name.len().min(TEMP_NAME_PREFIX_BYTES);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        ".{}.{}-{}{}",
        &name[..end],
        std::process::id(),
        counter,
        PARTIAL_SUFFIX
    )
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.ends_with(PARTIAL_SUFFIX)
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

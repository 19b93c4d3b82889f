//! JSON document store on local disk.
//!
//! The whole store is one JSON object mapping keys to string lists.
//! A write holds an exclusive lock on a `<name>.lock` sibling for the whole
//! read-modify-write, so separate processes on one store never interleave.
//! The new document goes to a uniquely named temporary file in the same
//! directory, is fsynced, then renamed over the target; a crash mid-write
//! leaves the previous document intact.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chatline_core::{PersistenceAdapter, PersistenceError};
use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, info};

type Document = BTreeMap<String, Vec<String>>;

pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Using transcript store: {}", path.display());
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Path) -> Result<T, PersistenceError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || job(&path))
            .await
            .map_err(|e| PersistenceError::Backend(format!("Storage task failed: {e}")))?
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Exclusive lock released when the handle is dropped. The lock file itself
/// stays, so every process always locks the same inode.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(parent_dir(path))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(path))?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to release store lock: {e}");
        }
    }
}

/// `None` when the file does not exist yet.
fn read_document(path: &Path) -> Result<Option<Document>, PersistenceError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(Some(Document::new()));
    }

    serde_json::from_str(&content).map(Some).map_err(|e| {
        PersistenceError::Backend(format!("Corrupt store {}: {e}", path.display()))
    })
}

/// An unfinished temporary file is deleted when dropped.
fn write_document(path: &Path, document: &Document) -> Result<(), PersistenceError> {
    let content = serde_json::to_string_pretty(document)
        .map_err(|e| PersistenceError::Backend(e.to_string()))?;

    let mut temp = NamedTempFile::new_in(parent_dir(path))?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn replace_list(path: &Path, key: &str, values: Vec<String>) -> Result<(), PersistenceError> {
    let _lock = StoreLock::acquire(path)?;

    let mut document = read_document(path)?.unwrap_or_default();
    document.insert(key.to_string(), values);
    write_document(path, &document)
}

#[async_trait]
impl PersistenceAdapter for FilePersistence {
    async fn get_list(&self, key: &str) -> Result<Vec<String>, PersistenceError> {
        let key_owned = key.to_string();
        let list = self
            .run_blocking(move |path| {
                Ok(read_document(path)?
                    .and_then(|mut document| document.remove(&key_owned))
                    .unwrap_or_default())
            })
            .await?;
        debug!("Read {} entries for key {key}", list.len());
        Ok(list)
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), PersistenceError> {
        let count = values.len();
        let key_owned = key.to_string();
        let values = values.to_vec();
        self.run_blocking(move |path| replace_list(path, &key_owned, values))
            .await?;

        debug!("Wrote {count} entries for key {key}");
        Ok(())
    }
}

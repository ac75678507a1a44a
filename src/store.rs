//! Whole-document persistence for the bank and progress data.
//!
//! A store holds exactly one serializable document. It is read once at startup and
//! rewritten in full after every mutation; callers get a `Result` back for both.

use std::{
    fs,
    io::{ErrorKind, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

#[cfg(test)]
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub trait DocumentStore<T>: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<T>, StoreError>;
    fn save(&self, doc: &T) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file, replaced atomically through a sibling temp file.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), _doc: PhantomData }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl<T> DocumentStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: self.display(), source }),
        };
        let doc = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Decode { path: self.display(), source })?;
        debug!(target: "store", bytes = bytes.len(), "Loaded document");
        Ok(Some(doc))
    }

    #[instrument(level = "debug", skip(self, doc), fields(path = %self.path.display()))]
    fn save(&self, doc: &T) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(doc)?;
        let write_err = |source: std::io::Error| StoreError::Write { path: self.display(), source };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).map_err(write_err)?;
        f.write_all(&body).map_err(write_err)?;
        f.sync_all().map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!(target: "store", bytes = body.len(), "Saved document");
        Ok(())
    }
}

/// In-process store used by tests to exercise the injection seam without touching disk.
#[cfg(test)]
pub struct MemoryStore<T> {
    doc: Mutex<Option<T>>,
}

#[cfg(test)]
impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self { doc: Mutex::new(None) }
    }

    pub fn with(doc: T) -> Self {
        Self { doc: Mutex::new(Some(doc)) }
    }
}

#[cfg(test)]
impl<T> DocumentStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        Ok(self.doc.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, doc: &T) -> Result<(), StoreError> {
        *self.doc.lock().unwrap_or_else(|p| p.into_inner()) = Some(doc.clone());
        Ok(())
    }
}

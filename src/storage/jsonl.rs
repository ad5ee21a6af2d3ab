use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations
///
/// Store-write failures are the one error class the pipeline treats as fatal:
/// losing the ability to persist records makes further work meaningless.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Bad record at {path}:{line}: {source}")]
    BadRecord {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An append-only store of one JSON record per line
///
/// Each append opens the file in append mode and writes a single line, so a
/// record is durable the instant `append` returns; there is no buffered state
/// to flush on shutdown. Concurrent writers are not supported - the pipeline
/// gives each store to exactly one writer.
#[derive(Debug, Clone)]
pub struct JsonlStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonlStore<T> {
    /// Creates a handle for the store at `path`; the file is created lazily
    /// on the first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the store's on-disk path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the store file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Appends one record as a JSON line
    pub fn append(&self, record: &T) -> StorageResult<()> {
        let line = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;

        writeln!(file, "{}", line).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(())
    }

    /// Loads every record in the store, in append order
    ///
    /// A missing file reads as an empty store. Blank lines are skipped; a
    /// malformed line is an error, since the stores are machine-written.
    pub fn load(&self) -> StorageResult<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record =
                serde_json::from_str(&line).map_err(|source| StorageError::BadRecord {
                    path: self.path.clone(),
                    line: idx + 1,
                    source,
                })?;
            records.push(record);
        }

        Ok(records)
    }
}

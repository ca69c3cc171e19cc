//! Durable storage for kiln: atomic file writes, advisory locks, the
//! per-project status snapshot, and the build archive.
//!
//! Everything here goes through [`write_atomic`] so that readers never
//! observe a half-written state, status, or archive file.

pub mod archive;
pub mod status;

use std::fs;
use std::io::Write;
use std::path::Path;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A storage operation failed. Carries the path so callers can log a
/// useful message without reconstructing it.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[error("{op} {path}: {source}")]
    Json {
        op: &'static str,
        path: String,
        source: serde_json::Error,
    },
}

impl PersistError {
    fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        PersistError::Io {
            op,
            path: path.display().to_string(),
            source,
        }
    }

    fn json(op: &'static str, path: &Path, source: serde_json::Error) -> Self {
        PersistError::Json {
            op,
            path: path.display().to_string(),
            source,
        }
    }
}

/// Write `data` to `path` atomically: write to a temp file in the same
/// directory, then rename over the destination.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PersistError> {
    let parent = path.parent().ok_or_else(|| {
        PersistError::io(
            "writing",
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent"),
        )
    })?;
    fs::create_dir_all(parent).map_err(|e| PersistError::io("writing", path, e))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| PersistError::io("writing", path, e))?;
    tmp.write_all(data)
        .map_err(|e| PersistError::io("writing", path, e))?;
    tmp.flush().map_err(|e| PersistError::io("writing", path, e))?;
    tmp.persist(path)
        .map_err(|e| PersistError::io("writing", path, e.error))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| PersistError::json("encoding", path, e))?;
    write_atomic(path, &data)
}

/// Read and decode a JSON file. A missing file is `Ok(None)`, not an
/// error, so first runs start from defaults.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::io("reading", path, e)),
    };
    let value =
        serde_json::from_slice(&data).map_err(|e| PersistError::json("decoding", path, e))?;
    Ok(Some(value))
}

/// Guard for an exclusive advisory file lock. The lock is released when
/// the guard is dropped.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive lock on `path`, creating the file if needed.
/// Fails immediately if another process holds the lock.
pub fn lock_file(path: &Path) -> Result<LockGuard, PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::io("locking", path, e))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| PersistError::io("locking", path, e))?;
    file.try_lock_exclusive()
        .map_err(|e| PersistError::io("locking", path, e))?;
    Ok(LockGuard { _file: file })
}

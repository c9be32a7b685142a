//! In-flight artifacts
//!
//! An `Artifact` owns one staging file inside the storage root. Bytes are
//! appended with `write` and hashed as they arrive; `close` either commits
//! the staging file as `<root>/<sha256>` or discards it. The staging file is
//! a `NamedTempFile`, so every path that does not commit (empty artifact,
//! duplicate, error, drop) removes it.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::hash::ContentHash;

/// Lifecycle state of an in-flight artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Staging file created, nothing written yet
    Open,
    /// At least one write succeeded
    Writing,
    /// A write failed; the artifact can only be closed (discarded) or dropped
    Failed,
    /// Terminal
    Closed,
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactState::Open => "open",
            ArtifactState::Writing => "writing",
            ArtifactState::Failed => "failed",
            ArtifactState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful, non-empty close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committed {
    /// SHA-256 of the artifact bytes
    pub hash: ContentHash,
    /// `<storage_root>/<hash>`, returned for new and duplicate content alike
    pub path: PathBuf,
    /// True if an object with this hash already existed
    pub duplicate: bool,
    /// Number of bytes written
    pub size: u64,
}

/// A byte stream being captured into the store.
///
/// Owned by exactly one caller; not meant to be shared between threads
/// while writing.
pub struct Artifact {
    root: PathBuf,
    staging: Option<NamedTempFile>,
    hasher: Sha256,
    bytes_written: u64,
    keep_empty: bool,
    state: ArtifactState,
}

impl Artifact {
    pub(crate) fn new(root: PathBuf, staging: NamedTempFile, keep_empty: bool) -> Self {
        debug!("opened artifact staging file {}", staging.path().display());
        Self {
            root,
            staging: Some(staging),
            hasher: Sha256::new(),
            bytes_written: 0,
            keep_empty,
            state: ArtifactState::Open,
        }
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn keep_empty(&self) -> bool {
        self.keep_empty
    }

    /// Path of the staging file, while there is one.
    pub fn staging_path(&self) -> Option<&Path> {
        self.staging.as_ref().map(|s| s.path())
    }

    /// Append `data` to the staging file.
    ///
    /// On an I/O failure the artifact moves to `Failed` and every further
    /// write returns `InvalidState`.
    pub fn write(&mut self, data: &[u8]) -> StoreResult<usize> {
        match self.state {
            ArtifactState::Open | ArtifactState::Writing => {}
            state => return Err(StoreError::InvalidState(state)),
        }
        let staging = match self.staging.as_mut() {
            Some(staging) => staging,
            None => return Err(StoreError::InvalidState(ArtifactState::Closed)),
        };

        if let Err(e) = staging.as_file_mut().write_all(data) {
            let path = staging.path().to_path_buf();
            self.state = ArtifactState::Failed;
            return Err(StoreError::io("write", path, e));
        }

        self.hasher.update(data);
        self.bytes_written += data.len() as u64;
        self.state = ArtifactState::Writing;
        Ok(data.len())
    }

    /// Finalize the artifact.
    ///
    /// Returns `None` when nothing is recorded: an empty artifact opened
    /// without `keep_empty`, or one whose writes failed. Otherwise the
    /// staging file is synced and moved to `<root>/<hash>` unless that
    /// object already exists, in which case the staging file is deleted and
    /// the result is marked as a duplicate.
    pub fn close(&mut self) -> StoreResult<Option<Committed>> {
        let staging = match (self.state, self.staging.take()) {
            (ArtifactState::Closed, _) | (_, None) => {
                return Err(StoreError::InvalidState(ArtifactState::Closed));
            }
            (ArtifactState::Failed, Some(staging)) => {
                self.state = ArtifactState::Closed;
                warn!(
                    "discarding artifact after failed write ({} bytes staged)",
                    self.bytes_written
                );
                discard(staging)?;
                return Ok(None);
            }
            (_, Some(staging)) => staging,
        };
        self.state = ArtifactState::Closed;

        if self.bytes_written == 0 && !self.keep_empty {
            debug!("discarding empty artifact {}", staging.path().display());
            discard(staging)?;
            return Ok(None);
        }

        // Content must be durable before its name becomes visible
        if let Err(e) = staging.as_file().sync_all() {
            return Err(StoreError::io("sync", staging.path().to_path_buf(), e));
        }

        let hash = ContentHash::from_digest(mem::take(&mut self.hasher).finalize());
        let path = self.root.join(hash.as_str());
        let size = self.bytes_written;

        if fs::symlink_metadata(&path).is_ok() {
            discard(staging)?;
            info!("Not storing duplicate content {}", hash);
            return Ok(Some(Committed {
                hash,
                path,
                duplicate: true,
                size,
            }));
        }

        match staging.persist_noclobber(&path) {
            Ok(_) => {
                sync_dir(&self.root);
                info!("stored artifact {} ({} bytes)", hash, size);
                Ok(Some(Committed {
                    hash,
                    path,
                    duplicate: false,
                    size,
                }))
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                // A concurrent close of identical content renamed first
                discard(err.file)?;
                info!("Not storing duplicate content {}", hash);
                Ok(Some(Committed {
                    hash,
                    path,
                    duplicate: true,
                    size,
                }))
            }
            Err(err) => {
                let staging_path = err.file.path().to_path_buf();
                Err(StoreError::io("rename", staging_path, err.error))
            }
        }
    }
}

impl Write for Artifact {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Artifact::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.staging.as_mut() {
            Some(staging) => staging.as_file_mut().flush(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("root", &self.root)
            .field("staging", &self.staging_path())
            .field("bytes_written", &self.bytes_written)
            .field("keep_empty", &self.keep_empty)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if let Some(staging) = &self.staging {
            debug!(
                "abandoning artifact in state {}, removing {}",
                self.state,
                staging.path().display()
            );
        }
    }
}

/// Delete a staging file, surfacing the failure.
fn discard(staging: NamedTempFile) -> StoreResult<()> {
    let path = staging.path().to_path_buf();
    staging
        .close()
        .map_err(|e| StoreError::io("delete", path, e))
}

/// Persist the directory entry of a fresh rename. Best effort.
fn sync_dir(dir: &Path) {
    let result = File::open(dir).and_then(|d| d.sync_all());
    if let Err(e) = result {
        debug!("could not sync directory {}: {}", dir.display(), e);
    }
}

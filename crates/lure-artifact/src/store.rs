//! Content-addressed artifact store.
//!
//! Flat layout: `<store_root>/<sha256>` for committed objects, plus
//! `<store_root>/.staging-<random>` for artifacts still being written.
//! Committed objects are immutable; nothing here removes them.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use tempfile::{Builder, NamedTempFile};
use walkdir::WalkDir;

use crate::artifact::{Artifact, Committed};
use crate::error::{StoreError, StoreResult};
use crate::hash::ContentHash;

/// File name prefix of staging files inside the storage root.
pub const STAGING_PREFIX: &str = ".staging-";

/// Random characters in a staging file name.
const STAGING_RAND_LEN: usize = 16;

/// A committed object as found on disk.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub hash: ContentHash,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// An object whose content no longer matches its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corruption {
    pub path: PathBuf,
    pub expected: ContentHash,
    pub actual: ContentHash,
}

/// Content-addressed store rooted at one directory.
///
/// Cheap to clone; clones share nothing but the root path, and all
/// coordination between writers happens through the filesystem.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Use an existing directory as storage root. Performs no I/O; a missing
    /// or unwritable root surfaces as `StorageUnavailable` on `open`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage root (and parents) if needed, then use it.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if let Err(source) = fs::create_dir_all(&root) {
            return Err(StoreError::StorageUnavailable { path: root, source });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new artifact; an empty result will be discarded.
    pub fn open(&self) -> StoreResult<Artifact> {
        self.open_with(false)
    }

    /// Start a new artifact that is committed even if nothing is written.
    pub fn open_keep_empty(&self) -> StoreResult<Artifact> {
        self.open_with(true)
    }

    pub fn open_with(&self, keep_empty: bool) -> StoreResult<Artifact> {
        let staging = self.staging_file()?;
        Ok(Artifact::new(self.root.clone(), staging, keep_empty))
    }

    fn staging_file(&self) -> StoreResult<NamedTempFile> {
        let mut builder = Builder::new();
        builder.prefix(STAGING_PREFIX).rand_bytes(STAGING_RAND_LEN);

        // The kernel applies the process umask to this mode
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }

        builder
            .tempfile_in(&self.root)
            .map_err(|source| StoreError::StorageUnavailable {
                path: self.root.clone(),
                source,
            })
    }

    /// Capture a complete byte slice in one call.
    pub fn put(&self, data: &[u8], keep_empty: bool) -> StoreResult<Option<Committed>> {
        let mut artifact = self.open_with(keep_empty)?;
        artifact.write(data)?;
        artifact.close()
    }

    /// Path at which the object for `hash` lives (whether or not it exists).
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.as_str())
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).is_file()
    }

    /// Read a committed object back in full.
    pub fn read_by_hash(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let mut data = Vec::new();
        self.reader(hash)?
            .read_to_end(&mut data)
            .map_err(|e| StoreError::io("read", self.object_path(hash), e))?;
        Ok(data)
    }

    /// Open a committed object for streaming reads.
    pub fn reader(&self, hash: &ContentHash) -> StoreResult<BufReader<File>> {
        let path = self.object_path(hash);
        match File::open(&path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(hash.clone()))
            }
            Err(e) => Err(StoreError::io("open", path, e)),
        }
    }

    /// All committed objects, sorted by hash.
    ///
    /// Staging files and anything not named by a well-formed hash are
    /// skipped.
    pub fn objects(&self) -> StoreResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::io("list", &self.root, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let hash = match entry.file_name().to_str().map(str::parse::<ContentHash>) {
                Some(Ok(hash)) => hash,
                _ => continue,
            };
            let metadata = entry
                .metadata()
                .map_err(|e| StoreError::io("stat", entry.path(), e.into()))?;

            objects.push(ObjectInfo {
                hash,
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        objects.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(objects)
    }

    /// Total size in bytes of all committed objects.
    pub fn total_size(&self) -> StoreResult<u64> {
        Ok(self.objects()?.iter().map(|o| o.size).sum())
    }

    /// Staging files currently present: open artifacts, or leftovers of a
    /// process that died before closing them.
    pub fn staging_files(&self) -> StoreResult<Vec<PathBuf>> {
        let entries =
            fs::read_dir(&self.root).map_err(|e| StoreError::io("list", &self.root, e))?;

        let mut staging = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("list", &self.root, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(STAGING_PREFIX) {
                    staging.push(entry.path());
                }
            }
        }
        staging.sort();
        Ok(staging)
    }

    /// Remove staging files last modified at least `older_than` ago.
    ///
    /// Pick a threshold well above the lifetime of a live upload; a staging
    /// file removed under an open artifact makes its `close` fail.
    pub fn sweep_staging(&self, older_than: Duration) -> StoreResult<usize> {
        let mut removed = 0;

        for path in self.staging_files()? {
            let age = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .unwrap_or(Duration::ZERO);
            if age < older_than {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed orphaned staging file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove staging file {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }

    /// Re-hash every committed object and report mismatches.
    pub fn verify(&self) -> StoreResult<Vec<Corruption>> {
        let mut corrupted = Vec::new();

        for object in self.objects()? {
            let actual = ContentHash::of_file(&object.path)
                .map_err(|e| StoreError::io("read", &object.path, e))?;
            if actual != object.hash {
                warn!(
                    "artifact {} does not match its content (found {})",
                    object.hash, actual
                );
                corrupted.push(Corruption {
                    path: object.path,
                    expected: object.hash,
                    actual,
                });
            }
        }

        Ok(corrupted)
    }
}

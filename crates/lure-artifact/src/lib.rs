//! Content-addressed artifact store
//!
//! Persists every file captured by the honeypot (uploads, downloads, piped
//! input) under a flat storage root, one immutable object per distinct
//! content, named by the lowercase hex SHA-256 of its bytes:
//! `<storage_root>/<sha256>`
//!
//! Features:
//! - Streaming writes into a private staging file with incremental hashing
//! - Atomic, no-clobber commit (staging file is fsynced, then renamed)
//! - Deduplication that holds across threads, processes and restarts
//! - Staging files are removed on every exit path that does not commit
//!
//! ```no_run
//! use lure_artifact::ArtifactStore;
//!
//! # fn main() -> Result<(), lure_artifact::StoreError> {
//! let store = ArtifactStore::new("/var/lib/lure/downloads");
//! let mut artifact = store.open()?;
//! artifact.write(b"Hello world")?;
//! if let Some(committed) = artifact.close()? {
//!     println!("{} -> {}", committed.hash, committed.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod error;
pub mod hash;
pub mod store;

pub use artifact::{Artifact, ArtifactState, Committed};
pub use error::{StoreError, StoreResult};
pub use hash::{ContentHash, HASH_HEX_LEN};
pub use store::{ArtifactStore, Corruption, ObjectInfo, STAGING_PREFIX};

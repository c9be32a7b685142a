//! Fake filesystem shown to attackers
//!
//! Tracks fake paths with ownership, mode and size. A file's contents come
//! either from inline bytes (the seeded honeyfs) or from a real backing
//! file, which is how captured uploads become readable inside the session.

mod honeyfs;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use honeyfs::{CPUINFO, MEMINFO};

/// Errors from fake filesystem operations
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("{0}: No such file or directory")]
    FileNotFound(String),

    #[error("{0}: Not a directory")]
    NotADirectory(String),

    #[error("{0}: Is a directory")]
    IsADirectory(String),

    #[error("{path}: failed to read backing file: {source}")]
    Backing {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for fake filesystem operations
pub type VfsResult<T> = Result<T, VfsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One fake path
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub kind: EntryKind,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub size: u64,
    /// Inline contents for seeded files
    pub contents: Option<Vec<u8>>,
    /// Real file holding the contents, e.g. a committed artifact
    pub realfile: Option<PathBuf>,
}

impl Entry {
    fn dir(uid: u32, gid: u32, mode: u32) -> Self {
        Self {
            kind: EntryKind::Dir,
            uid,
            gid,
            mode,
            size: 4096,
            contents: None,
            realfile: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// In-memory fake filesystem keyed by normalized absolute path
#[derive(Debug, Clone)]
pub struct FakeFs {
    entries: BTreeMap<String, Entry>,
}

impl FakeFs {
    /// Filesystem containing only `/`.
    pub fn empty() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), Entry::dir(0, 0, 0o755));
        Self { entries }
    }

    /// Resolve `path` against `cwd`, collapsing `.`, `..` and repeated
    /// slashes. `..` at the root stays at the root.
    pub fn resolve_path(&self, path: &str, cwd: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", cwd, path)
        };

        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        format!("/{}", parts.join("/"))
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.get(path).map_or(false, Entry::is_dir)
    }

    fn check_parent(&self, path: &str) -> VfsResult<()> {
        let parent = match path.rfind('/') {
            Some(0) => "/",
            Some(i) => &path[..i],
            None => return Err(VfsError::FileNotFound(path.to_string())),
        };
        match self.get(parent) {
            Some(entry) if entry.is_dir() => Ok(()),
            Some(_) => Err(VfsError::NotADirectory(parent.to_string())),
            None => Err(VfsError::FileNotFound(path.to_string())),
        }
    }

    pub fn mkdir(&mut self, path: &str, uid: u32, gid: u32, mode: u32) -> VfsResult<()> {
        self.check_parent(path)?;
        self.entries
            .insert(path.to_string(), Entry::dir(uid, gid, mode));
        Ok(())
    }

    /// Create (or replace) a regular file entry without contents.
    pub fn mkfile(&mut self, path: &str, uid: u32, gid: u32, size: u64, mode: u32) -> VfsResult<()> {
        self.check_parent(path)?;
        if self.is_dir(path) {
            return Err(VfsError::IsADirectory(path.to_string()));
        }
        self.entries.insert(
            path.to_string(),
            Entry {
                kind: EntryKind::File,
                uid,
                gid,
                mode,
                size,
                contents: None,
                realfile: None,
            },
        );
        Ok(())
    }

    /// Point a fake file at a real backing file; size follows the real file.
    pub fn update_realfile(&mut self, path: &str, realfile: impl AsRef<Path>) -> VfsResult<()> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| VfsError::FileNotFound(path.to_string()))?;
        if entry.is_dir() {
            return Err(VfsError::IsADirectory(path.to_string()));
        }
        let realfile = realfile.as_ref().to_path_buf();
        if let Ok(metadata) = fs::metadata(&realfile) {
            entry.size = metadata.len();
        }
        entry.contents = None;
        entry.realfile = Some(realfile);
        Ok(())
    }

    pub fn chown(&mut self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| VfsError::FileNotFound(path.to_string()))?;
        entry.uid = uid;
        entry.gid = gid;
        Ok(())
    }

    /// Contents of a fake file. Files with neither inline contents nor a
    /// backing file read as empty.
    pub fn file_contents(&self, path: &str) -> VfsResult<Vec<u8>> {
        let entry = self
            .get(path)
            .ok_or_else(|| VfsError::FileNotFound(path.to_string()))?;
        if entry.is_dir() {
            return Err(VfsError::IsADirectory(path.to_string()));
        }
        if let Some(contents) = &entry.contents {
            return Ok(contents.clone());
        }
        match &entry.realfile {
            Some(real) => fs::read(real).map_err(|source| VfsError::Backing {
                path: path.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for FakeFs {
    /// The seeded honeyfs: a handful of standard directories plus
    /// `/proc/meminfo` and `/proc/cpuinfo`.
    fn default() -> Self {
        let mut fs = Self::empty();
        for dir in honeyfs::DIRECTORIES {
            fs.entries
                .insert(dir.to_string(), Entry::dir(0, 0, 0o755));
        }
        if let Some(root_home) = fs.entries.get_mut("/root") {
            root_home.mode = 0o700;
        }
        if let Some(tmp) = fs.entries.get_mut("/tmp") {
            tmp.mode = 0o1777;
        }
        for (path, contents) in honeyfs::FILES {
            fs.entries.insert(
                path.to_string(),
                Entry {
                    kind: EntryKind::File,
                    uid: 0,
                    gid: 0,
                    mode: 0o444,
                    size: contents.len() as u64,
                    contents: Some(contents.as_bytes().to_vec()),
                    realfile: None,
                },
            );
        }
        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let fs = FakeFs::empty();
        assert_eq!(fs.resolve_path("x.sh", "/root"), "/root/x.sh");
        assert_eq!(fs.resolve_path("/tmp/./a", "/root"), "/tmp/a");
        assert_eq!(fs.resolve_path("../tmp//b", "/root"), "/tmp/b");
        assert_eq!(fs.resolve_path("../../..", "/root"), "/");
        assert_eq!(fs.resolve_path(".", "/"), "/");
    }

    #[test]
    fn test_default_honeyfs() {
        let fs = FakeFs::default();
        for dir in ["/", "/root", "/tmp", "/etc/init.d", "/proc", "/usr/bin"] {
            assert!(fs.is_dir(dir), "{} should be a directory", dir);
        }
        assert!(fs.file_contents("/proc/meminfo").unwrap().starts_with(b"MemTotal:"));
        assert!(fs.get("/etc/init.d").is_some());
        assert!(!fs.exists("/etc/init.d/iptables"));
    }

    #[test]
    fn test_mkfile_requires_parent() {
        let mut fs = FakeFs::default();
        fs.mkfile("/tmp/a", 0, 0, 3, 0o644).unwrap();
        assert!(fs.exists("/tmp/a"));

        let err = fs.mkfile("/nope/a", 0, 0, 3, 0o644).unwrap_err();
        assert!(matches!(err, VfsError::FileNotFound(p) if p == "/nope/a"));

        let err = fs.mkfile("/tmp/a/b", 0, 0, 3, 0o644).unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));

        assert!(matches!(
            fs.mkfile("/tmp", 0, 0, 0, 0o644),
            Err(VfsError::IsADirectory(_))
        ));
    }

    #[test]
    fn test_mkdir() {
        let mut fs = FakeFs::default();
        fs.mkdir("/home/admin", 1000, 1000, 0o755).unwrap();
        assert!(fs.is_dir("/home/admin"));
        assert_eq!(fs.get("/home/admin").unwrap().uid, 1000);

        fs.mkfile("/home/admin/.bashrc", 1000, 1000, 0, 0o644).unwrap();
        assert!(matches!(
            fs.mkdir("/home/nobody/x", 0, 0, 0o755),
            Err(VfsError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_realfile_backs_contents() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("blob");
        std::fs::write(&real, b"captured").unwrap();

        let mut fs = FakeFs::default();
        fs.mkfile("/tmp/x", 0, 0, 0, 0o644).unwrap();
        assert!(fs.file_contents("/tmp/x").unwrap().is_empty());

        fs.update_realfile("/tmp/x", &real).unwrap();
        assert_eq!(fs.file_contents("/tmp/x").unwrap(), b"captured");
        assert_eq!(fs.get("/tmp/x").unwrap().size, 8);
    }

    #[test]
    fn test_chown() {
        let mut fs = FakeFs::default();
        fs.mkfile("/tmp/x", 0, 0, 0, 0o644).unwrap();
        fs.chown("/tmp/x", 1000, 100).unwrap();

        let entry = fs.get("/tmp/x").unwrap();
        assert_eq!((entry.uid, entry.gid), (1000, 100));
        assert!(fs.chown("/tmp/missing", 0, 0).is_err());
    }
}

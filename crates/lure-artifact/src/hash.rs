//! Content hashes
//!
//! A `ContentHash` is the lowercase hex SHA-256 of an artifact's bytes and
//! doubles as its file name inside the storage root. Parsing accepts only
//! the exact 64-character form, so a parsed hash can never name anything
//! outside the root.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 digest of an artifact, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a complete byte slice.
    pub fn of(data: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(data))
    }

    /// Hash everything a reader yields, in 64 KiB chunks.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..n]);
        }
        Ok(Self::from_digest(hasher.finalize()))
    }

    /// Hash the contents of a file on disk.
    pub fn of_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub(crate) fn from_digest(digest: impl AsRef<[u8]>) -> Self {
        ContentHash(hex::encode(digest))
    }

    /// Whether `s` is a well-formed hash (64 lowercase hex chars).
    pub fn is_valid(s: &str) -> bool {
        s.len() == HASH_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentHash {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(ContentHash(s.to_string()))
        } else {
            Err(StoreError::InvalidHash(s.to_string()))
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HELLO_WORLD: &str = "64ec88ca00b268e5ba1a35678a1b5316d212f4f366b2477232534a8aeca37f3c";
    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_hash_of_bytes() {
        assert_eq!(ContentHash::of(b"Hello world").as_str(), HELLO_WORLD);
        assert_eq!(ContentHash::of(b"").as_str(), EMPTY);
    }

    #[test]
    fn test_hash_from_reader_matches_slice() {
        // Larger than one read buffer so chunking is exercised
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let streamed = ContentHash::from_reader(Cursor::new(&data)).unwrap();
        assert_eq!(streamed, ContentHash::of(&data));
    }

    #[test]
    fn test_hash_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample");
        std::fs::write(&path, b"Hello world").unwrap();
        assert_eq!(ContentHash::of_file(&path).unwrap().as_str(), HELLO_WORLD);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(HELLO_WORLD.parse::<ContentHash>().is_ok());
        assert!("../etc/passwd".parse::<ContentHash>().is_err());
        assert!(HELLO_WORLD[..63].parse::<ContentHash>().is_err());
        assert!(HELLO_WORLD.to_uppercase().parse::<ContentHash>().is_err());
        assert!(matches!(
            "xyz".parse::<ContentHash>(),
            Err(StoreError::InvalidHash(s)) if s == "xyz"
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let hash = ContentHash::of(b"Hello world");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", HELLO_WORLD));

        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<ContentHash>("\"nope\"").is_err());
    }
}

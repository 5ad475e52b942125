//! Streaming SHA-256 digests of file contents.
//!
//! Files are read in bounded chunks so memory use does not depend on file
//! size. Only the byte stream is hashed; timestamps and permissions never
//! influence the result.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{MonitorError, Result};

/// Default read chunk: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// A 64-character lowercase hexadecimal SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    pub fn of_bytes(data: &[u8]) -> Self {
        Digest(hex::encode(Sha256::digest(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == DIGEST_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Digest(s.to_string()))
        } else {
            Err(format!("not a lowercase SHA-256 hex digest: {s:?}"))
        }
    }
}

impl TryFrom<String> for Digest {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// A path together with the digest of its current content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub digest: Digest,
}

#[derive(Debug, Clone, Copy)]
pub struct DigestEngine {
    chunk_size: usize,
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl DigestEngine {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn digest_file<P: AsRef<Path>>(&self, path: P) -> Result<Digest> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MonitorError::read(path, e))?;
        self.digest_reader(file).map_err(|e| MonitorError::read(path, e))
    }

    pub fn identify<P: AsRef<Path>>(&self, path: P) -> Result<FileIdentity> {
        let path = path.as_ref();
        Ok(FileIdentity {
            path: path.to_path_buf(),
            digest: self.digest_file(path)?,
        })
    }

    pub fn digest_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Digest(hex::encode(hasher.finalize())))
    }
}

/// Digest a file with the default chunk size.
pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<Digest> {
    DigestEngine::default().digest_file(path)
}

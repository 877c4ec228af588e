//! Content digests.
//!
//! Every archived revision is keyed by the BLAKE3-256 digest of its bytes,
//! written as 64 lowercase hex characters in the version table, in archive
//! file names and on the command line.

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Digest width in bytes.
pub const HASH_SIZE: usize = 32;

/// Digest algorithm recorded in the repository config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Blake3,
}

impl Algorithm {
    /// Config-file spelling (`algo=...`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Blake3 => "blake3-256",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        if name == Algorithm::Blake3.as_str() {
            Ok(Algorithm::Blake3)
        } else {
            Err(Error::unsupported_algorithm(name))
        }
    }
}

/// Digest of one revision's bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Parse a digest as printed by `hist`. Upper-case input is accepted.
    pub fn from_hex(text: &str) -> Result<Self> {
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(text, &mut bytes).map_err(|e| {
            Error::invalid_hash(format!(
                "{:?} is not a {}-character hex digest ({})",
                text,
                HASH_SIZE * 2,
                e
            ))
        })?;
        Ok(Hash(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Digest of an in-memory buffer.
    pub fn hash_bytes(data: &[u8]) -> Self {
        blake3::hash(data).into()
    }

    /// Digest of everything `reader` yields, without buffering it all.
    pub fn hash_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(hasher.finalize().into())
    }

    /// Digest of a file's current contents.
    pub fn hash_file(path: &Path) -> Result<Self> {
        Self::hash_reader(File::open(path)?)
    }
}

impl From<blake3::Hash> for Hash {
    fn from(digest: blake3::Hash) -> Self {
        Hash(*digest.as_bytes())
    }
}

impl FromStr for Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Hash::from_hex(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps test failure output readable.
        write!(f, "Hash({}..)", &self.to_hex()[..12])
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

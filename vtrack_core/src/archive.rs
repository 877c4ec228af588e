//! Content-addressed archive of gzip-compressed blobs.
//!
//! Every blob lives at `archives/<hex digest>.gz`, where the digest is taken
//! over the original (uncompressed) bytes. The presence of that file is the
//! single source of truth for "these exact bytes were archived".

use crate::error::{Error, Result};
use crate::hash::Hash;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of archived blobs.
const ARCHIVE_EXT: &str = "gz";

/// The content store.
#[derive(Debug)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    /// Open an archive rooted at `dir`. The directory must already exist.
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Get the path of the blob stored under `hash`.
    pub fn blob_path(&self, hash: &Hash) -> PathBuf {
        self.dir.join(format!("{}.{}", hash.to_hex(), ARCHIVE_EXT))
    }

    /// Check whether content with this digest is archived.
    pub fn exists(&self, hash: &Hash) -> bool {
        self.blob_path(hash).is_file()
    }

    /// Compress and store `data`, returning its digest.
    ///
    /// Storing bytes that are already present is a no-op that returns the
    /// same digest.
    pub fn put(&self, data: &[u8]) -> Result<Hash> {
        let hash = Hash::hash_bytes(data);

        let path = self.blob_path(&hash);
        if path.exists() {
            return Ok(hash);
        }

        let compressed = compress_gzip(data)?;

        // Write atomically using tempfile
        let mut temp_file = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;
        temp_file.persist(&path)?;

        debug!(digest = %hash, bytes = data.len(), "archived blob");
        Ok(hash)
    }

    /// Retrieve the original bytes stored under `hash`.
    pub fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);

        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::archive_not_found(hash.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };

        let data = decompress_gzip(&compressed)
            .map_err(|e| Error::corrupted_archive(&path, format!("gzip: {}", e)))?;

        // Verify hash matches uncompressed data (corruption detection)
        let computed = Hash::hash_bytes(&data);
        if computed != *hash {
            return Err(Error::corrupted_archive(
                &path,
                format!(
                    "Hash mismatch: expected {}, got {}",
                    hash.to_hex(),
                    computed.to_hex()
                ),
            ));
        }

        Ok(data)
    }

    /// Decompress the blob stored under `hash` into a new file at `dest`,
    /// replacing any file already there.
    pub fn extract_to(&self, hash: &Hash, dest: &Path) -> Result<()> {
        let data = self.get(hash)?;
        fs::write(dest, data)?;
        debug!(digest = %hash, dest = %dest.display(), "extracted blob");
        Ok(())
    }

    /// Stream the original bytes stored under `hash` to a writer.
    pub fn to_writer<W: Write>(&self, hash: &Hash, mut writer: W) -> Result<()> {
        let data = self.get(hash)?;
        writer.write_all(&data)?;
        Ok(())
    }

    /// Delete the blob stored under `hash`. Removing an absent blob is not an error.
    pub fn remove(&self, hash: &Hash) -> Result<()> {
        match fs::remove_file(self.blob_path(hash)) {
            Ok(()) => {
                debug!(digest = %hash, "removed blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List the digests of every archived blob, sorted.
    ///
    /// Files that do not look like `<hex digest>.gz` are skipped.
    pub fn list(&self) -> Result<Vec<Hash>> {
        let mut hashes = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(hash) = Hash::from_hex(stem)
            {
                hashes.push(hash);
            }
        }

        hashes.sort();
        Ok(hashes)
    }
}

/// Compress data using gzip.
fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress gzip data.
fn decompress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

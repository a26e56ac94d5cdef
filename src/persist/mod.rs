//! Atomic, versioned on-disk persistence for index artifacts.
//!
//! Every artifact is written to a temp file inside the cache directory,
//! fsynced, then renamed into place — the same write-temp-then-rename
//! commit point used throughout this codebase's storage layer, scaled down
//! to a directory of independent sibling files instead of one manifest
//! fronting many data files. A reader either sees the fully-old file or
//! the fully-new one; POSIX `rename()` never exposes a half-written one.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{RetrievalError, Result};

/// Magic bytes prefixed to every artifact file, followed by a one-byte
/// format version. Guards against silently deserializing a file from an
/// incompatible future (or ancient) layout as if it were valid.
const MAGIC: [u8; 4] = *b"HYRT";
const FORMAT_VERSION: u8 = 1;

/// Writes `value` as bincode to `dir/name`, via a temp file in the same
/// directory, fsynced before and after the atomic rename.
pub fn write_atomic<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let temp_path = dir.join(format!(".{name}.tmp"));
    let final_path = dir.join(name);

    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&MAGIC)?;
        writer.write_all(&[FORMAT_VERSION])?;
        bincode::serialize_into(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    std::fs::rename(&temp_path, &final_path)?;
    fsync_dir(dir)?;
    Ok(())
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let handle = File::open(dir)?;
    let rc = unsafe { libc::fsync(handle.as_raw_fd()) };
    if rc != 0 {
        return Err(RetrievalError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Reads and deserializes an artifact written by [`write_atomic`]. Missing
/// file surfaces as `CacheMissing` naming the artifact; a bad header
/// surfaces as `CacheIncompatible`.
pub fn read_artifact<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(RetrievalError::CacheMissing(path.display().to_string()));
    }
    let bytes = std::fs::read(&path)?;
    if bytes.len() < 5 || bytes[0..4] != MAGIC {
        return Err(RetrievalError::CacheIncompatible(format!(
            "{}: missing or corrupt header",
            path.display()
        )));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(RetrievalError::CacheIncompatible(format!(
            "{}: format version {} unsupported (expected {})",
            path.display(),
            bytes[4],
            FORMAT_VERSION
        )));
    }
    Ok(bincode::deserialize(&bytes[5..])?)
}

pub fn artifact_exists(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}

/// Corpus/model fingerprint stored alongside the semantic-index artifacts
/// so a cache built against a different corpus or embedding model is
/// detected instead of silently mis-ranking (the stale-cache gap called
/// out against the chunked index).
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct CacheFingerprint {
    pub document_count: u64,
    pub corpus_checksum: u32,
    pub model_name: String,
}

impl CacheFingerprint {
    pub fn compute(documents: &[crate::dataset::Document], model_name: &str) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        for doc in documents {
            hasher.update(&doc.id.to_le_bytes());
            hasher.update(doc.title.as_bytes());
            hasher.update(doc.description.as_bytes());
        }
        CacheFingerprint {
            document_count: documents.len() as u64,
            corpus_checksum: hasher.finalize(),
            model_name: model_name.to_string(),
        }
    }
}

/// Names of the artifacts PersistenceStore manages, matching the
/// documented cache directory layout.
pub mod artifact_names {
    pub const POSTINGS: &str = "index";
    pub const DOCMAP: &str = "docmap";
    pub const TERM_FREQUENCIES: &str = "term_frequencies";
    pub const DOC_LENGTHS: &str = "doc_lengths";
    pub const CHUNK_EMBEDDINGS: &str = "chunk_embeddings";
    pub const CHUNK_METADATA: &str = "chunk_metadata";
    pub const CHUNK_FINGERPRINT: &str = "chunk_fingerprint";
    pub const DOC_EMBEDDINGS: &str = "doc_embeddings";
    pub const DOC_EMBEDDINGS_FINGERPRINT: &str = "doc_embeddings_fingerprint";
}

/// Resolves the cache directory for a given base directory, matching the
/// documented `cache/` layout.
pub fn cache_dir(base: &Path) -> PathBuf {
    base.join("cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let value = vec![1u32, 2, 3, 4];
        write_atomic(dir.path(), "numbers", &value).unwrap();
        let loaded: Vec<u32> = read_artifact(dir.path(), "numbers").unwrap();
        assert_eq!(value, loaded);
    }

    #[test]
    fn missing_artifact_is_cache_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_artifact::<Vec<u32>>(dir.path(), "absent").unwrap_err();
        assert!(matches!(err, RetrievalError::CacheMissing(_)));
    }

    #[test]
    fn truncated_file_is_cache_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad"), b"xx").unwrap();
        let err = read_artifact::<Vec<u32>>(dir.path(), "bad").unwrap_err();
        assert!(matches!(err, RetrievalError::CacheIncompatible(_)));
    }

    #[test]
    fn fingerprint_changes_with_corpus() {
        use crate::dataset::Document;
        let docs_a = vec![Document { id: 1, title: "A".into(), description: "x".into() }];
        let docs_b = vec![Document { id: 1, title: "B".into(), description: "x".into() }];
        let fp_a = CacheFingerprint::compute(&docs_a, "m");
        let fp_b = CacheFingerprint::compute(&docs_b, "m");
        assert_ne!(fp_a, fp_b);
    }
}

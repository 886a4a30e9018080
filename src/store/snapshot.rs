//! Snapshot persistence for MemoryStore
//!
//! ## File Format
//! ```text
//! ┌───────────┬─────────┬─────────┬──────────────────────┐
//! │ Magic (4) │ CRC (4) │ Len (8) │ Data (bincode)       │
//! └───────────┴─────────┴─────────┴──────────────────────┘
//! ```
//! The CRC covers the data bytes only. Snapshots are written to a sibling
//! temp file and renamed into place, so a crash mid-save leaves the previous
//! snapshot intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagError};

use super::memory::{MemoryStore, StoredValue};

/// File magic
pub const MAGIC: &[u8; 4] = b"TGSN";

/// Header size: magic (4) + crc (4) + len (8)
pub const SNAPSHOT_HEADER_SIZE: usize = 16;

#[derive(Serialize, Deserialize)]
struct SnapshotData {
    entries: Vec<(String, StoredValue)>,
}

impl MemoryStore {
    /// Write every key to `path`, replacing any previous snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        let entries: Vec<(String, StoredValue)> = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let key_count = entries.len();

        let payload = bincode::serialize(&SnapshotData { entries })
            .map_err(|e| TagError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let tmp_path = Self::temp_path(path);
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(MAGIC)?;
            file.write_all(&crc.to_be_bytes())?;
            file.write_all(&(payload.len() as u64).to_be_bytes())?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::debug!(path = %path.display(), keys = key_count, "snapshot saved");
        Ok(())
    }

    /// Read a snapshot written by `save`
    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        if bytes.len() < SNAPSHOT_HEADER_SIZE {
            return Err(TagError::SnapshotCorruption(format!(
                "file is {} bytes, shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(TagError::SnapshotCorruption("bad magic".to_string()));
        }

        let crc = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[8..16]);
        let len = u64::from_be_bytes(len_bytes) as usize;

        let payload = &bytes[SNAPSHOT_HEADER_SIZE..];
        if payload.len() != len {
            return Err(TagError::SnapshotCorruption(format!(
                "expected {} payload bytes, found {}",
                len,
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != crc {
            return Err(TagError::SnapshotCorruption("checksum mismatch".to_string()));
        }

        let snapshot: SnapshotData = bincode::deserialize(payload)
            .map_err(|e| TagError::Serialization(e.to_string()))?;
        let data: BTreeMap<String, StoredValue> = snapshot.entries.into_iter().collect();

        tracing::debug!(path = %path.display(), keys = data.len(), "snapshot loaded");
        Ok(Self::from_data(data))
    }

    /// Load `path` if it exists, otherwise start empty
    pub fn open_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "no snapshot found, starting empty");
            Ok(Self::new())
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

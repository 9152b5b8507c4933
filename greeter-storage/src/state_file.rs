//! Single-file state backend.
//!
//! File layout:
//! ```text
//! {"version":1,"checksum":"1a2b3c4d","length":123}\n
//! <length bytes of JSON-encoded PersistedState>
//! ```
//! The checksum is the CRC32C of the body bytes. Saves write a sibling temp file, fsync it,
//! and rename it over the old file, so a crash mid-save leaves the previous state intact.

use crate::error::StorageError;
use greeter_core::{CoreError, PersistedState, StateBackend};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Current on-disk format version.
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Header line preceding the state body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateHeader {
    version: u32,
    checksum: String,
    length: u64,
}

/// State backend stored in one file.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Creates a backend for `path`. Nothing is touched on disk until the first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a state file has been written.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads and verifies the state file.
    pub fn read(&self) -> Result<Option<PersistedState>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut data = Vec::new();
        File::open(&self.path)?.read_to_end(&mut data)?;

        let newline = data
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| StorageError::Corruption("missing state header".to_string()))?;
        let header: StateHeader = serde_json::from_slice(&data[..newline])?;
        if header.version != STATE_FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion(header.version));
        }

        let body = &data[newline + 1..];
        if body.len() as u64 != header.length {
            return Err(StorageError::Corruption(format!(
                "state body is {} bytes, header says {}",
                body.len(),
                header.length
            )));
        }

        let actual_checksum = format!("{:08x}", crc32c::crc32c(body));
        if actual_checksum != header.checksum {
            return Err(StorageError::Corruption(format!(
                "state checksum mismatch (expected {}, got {})",
                header.checksum, actual_checksum
            )));
        }

        let state: PersistedState = serde_json::from_slice(body)?;
        Ok(Some(state))
    }

    /// Atomically replaces the state file.
    pub fn write(&self, state: &PersistedState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let body = serde_json::to_vec_pretty(state)?;
        let header = StateHeader {
            version: STATE_FORMAT_VERSION,
            checksum: format!("{:08x}", crc32c::crc32c(&body)),
            length: body.len() as u64,
        };

        let tmp_path = self.tmp_path();
        {
            let mut file = File::create(&tmp_path)?;
            serde_json::to_writer(&mut file, &header)?;
            file.write_all(b"\n")?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            "Wrote state file {} ({} active, {} penalized, {} bytes)",
            self.path.display(),
            state.active.len(),
            state.penalized.len(),
            body.len()
        );

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateBackend for StateFile {
    fn load(&self) -> Result<Option<PersistedState>, CoreError> {
        Ok(self.read()?)
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        Ok(self.write(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use greeter_core::{MemberId, MemberRecord, MembershipStore};
    use tempfile::TempDir;

    fn sample_state() -> PersistedState {
        let joined = Utc.with_ymd_and_hms(2024, 2, 29, 18, 30, 0).unwrap();
        let mut state = PersistedState::default();
        let mut notified = MemberRecord::new("Alice", Some("alice".to_string()), joined);
        notified.notified = true;
        state.active.insert(MemberId::new(1), notified);
        state
            .active
            .insert(MemberId::new(2), MemberRecord::new("Bob", None, joined));
        state.penalized.insert(
            MemberId::new(-3),
            MemberRecord::new("Carol", Some("carol".to_string()), joined),
        );
        state
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("members.json"));

        let state = sample_state();
        file.write(&state).unwrap();

        let loaded = file.read().unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("absent.json"));

        assert!(!file.exists());
        assert!(file.read().unwrap().is_none());

        let store = MembershipStore::load(file).unwrap();
        assert!(store.active().is_empty());
        assert!(store.penalized().is_empty());
    }

    #[test]
    fn test_write_creates_parent_dirs_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state").join("members.json");
        let file = StateFile::new(&path);

        file.write(&PersistedState::default()).unwrap();

        assert!(path.exists());
        assert!(!path.with_file_name("members.json.tmp").exists());
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("members.json"));

        file.write(&sample_state()).unwrap();
        file.write(&PersistedState::default()).unwrap();

        assert_eq!(file.read().unwrap().unwrap(), PersistedState::default());
    }

    #[test]
    fn test_detects_flipped_byte() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.json");
        let file = StateFile::new(&path);
        file.write(&sample_state()).unwrap();

        let mut data = fs::read(&path).unwrap();
        let idx = data.iter().rposition(|b| *b == b'A').unwrap();
        data[idx] = b'Z';
        fs::write(&path, &data).unwrap();

        assert!(matches!(file.read(), Err(StorageError::Corruption(_))));
    }

    #[test]
    fn test_detects_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.json");
        let file = StateFile::new(&path);
        file.write(&sample_state()).unwrap();

        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..data.len() - 10]).unwrap();

        assert!(matches!(file.read(), Err(StorageError::Corruption(_))));
    }

    #[test]
    fn test_garbage_fails_store_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.json");
        fs::write(&path, b"not a state file").unwrap();

        let result = MembershipStore::load(StateFile::new(&path));
        assert!(matches!(result, Err(CoreError::Decode { .. })));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.json");
        fs::write(&path, b"{\"version\":99,\"checksum\":\"00000000\",\"length\":2}\n{}").unwrap();

        assert!(matches!(
            StateFile::new(&path).read(),
            Err(StorageError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_store_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.json");
        let joined = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();

        {
            let mut store = MembershipStore::load(StateFile::new(&path)).unwrap();
            store
                .record_join(MemberId::new(11), "Dan", Some("dan".to_string()), joined)
                .unwrap();
            store
                .record_join(MemberId::new(12), "Erin", None, joined)
                .unwrap();
            assert!(store.acknowledge(MemberId::new(12)).unwrap());
        }

        let store = MembershipStore::load(StateFile::new(&path)).unwrap();
        assert_eq!(store.active().len(), 1);
        let record = &store.active()[&MemberId::new(11)];
        assert_eq!(record.display_name, "Dan");
        assert_eq!(record.handle.as_deref(), Some("dan"));
        assert_eq!(record.joined_at, joined);
        assert!(!record.notified);
    }
}

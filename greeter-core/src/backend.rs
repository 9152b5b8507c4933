//! Durable state backends.

use crate::error::CoreError;
use crate::member::{MemberId, MemberRecord};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything the store writes out: both collections, in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub active: BTreeMap<MemberId, MemberRecord>,
    #[serde(default)]
    pub penalized: BTreeMap<MemberId, MemberRecord>,
}

/// Full-read / full-overwrite storage for [`PersistedState`].
pub trait StateBackend: Send {
    /// Reads the last saved state. `Ok(None)` means nothing was ever saved.
    fn load(&self) -> Result<Option<PersistedState>, CoreError>;

    /// Replaces the saved state.
    fn save(&self, state: &PersistedState) -> Result<(), CoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: Option<PersistedState>,
    saves: u64,
    fail_saves: bool,
}

/// In-memory backend.
///
/// Clones share the same slot, so a test can hand one clone to the store and inspect
/// the saved state through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds `state`.
    pub fn with_state(state: PersistedState) -> Self {
        let backend = Self::default();
        backend.inner.lock().state = Some(state);
        backend
    }

    /// Returns the last saved state.
    pub fn saved(&self) -> Option<PersistedState> {
        self.inner.lock().state.clone()
    }

    /// Returns how many successful saves happened.
    pub fn save_count(&self) -> u64 {
        self.inner.lock().saves
    }

    /// Makes subsequent saves fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.lock().fail_saves = fail;
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<PersistedState>, CoreError> {
        Ok(self.inner.lock().state.clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_saves {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory backend refused write",
            )));
        }
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }
}

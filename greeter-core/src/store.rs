//! Membership store - the active and penalized collections.
//!
//! Every mutating operation applies its change in memory and then persists the whole state
//! before returning. A failed write leaves the in-memory change applied and surfaces the
//! error to the caller.

use crate::backend::{MemoryBackend, PersistedState, StateBackend};
use crate::error::CoreError;
use crate::member::{MemberId, MemberRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Read-only copy of both collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub active: BTreeMap<MemberId, MemberRecord>,
    pub penalized: BTreeMap<MemberId, MemberRecord>,
}

/// Owner of the membership state.
pub struct MembershipStore {
    state: PersistedState,
    backend: Box<dyn StateBackend>,
}

impl MembershipStore {
    /// Rebuilds the store from `backend`. A backend with no saved state yields an empty store.
    pub fn load(backend: impl StateBackend + 'static) -> Result<Self, CoreError> {
        let state = backend.load()?.unwrap_or_default();

        let overlap: Vec<MemberId> = state
            .active
            .keys()
            .filter(|id| state.penalized.contains_key(id))
            .copied()
            .collect();
        if !overlap.is_empty() {
            return Err(CoreError::Decode {
                reason: format!(
                    "members present in both active and penalized lists: {:?}",
                    overlap
                ),
            });
        }

        tracing::debug!(
            "Loaded membership state: {} active, {} penalized",
            state.active.len(),
            state.penalized.len()
        );

        Ok(Self {
            state,
            backend: Box::new(backend),
        })
    }

    /// Creates an empty store that persists to memory only.
    pub fn in_memory() -> Self {
        Self {
            state: PersistedState::default(),
            backend: Box::new(MemoryBackend::new()),
        }
    }

    /// Records a join. A rejoining member starts a fresh grace period and leaves the
    /// penalty list.
    pub fn record_join(
        &mut self,
        id: MemberId,
        display_name: impl Into<String>,
        handle: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if self.state.penalized.remove(&id).is_some() {
            tracing::debug!("Member {} rejoined, dropped from penalty list", id);
        }
        self.state
            .active
            .insert(id, MemberRecord::new(display_name, handle, now));
        self.persist()
    }

    /// Removes `id` from the active list, or failing that from the penalty list.
    ///
    /// Returns whether anything was removed; an unknown member is not an error.
    pub fn acknowledge(&mut self, id: MemberId) -> Result<bool, CoreError> {
        let removed = self.state.active.remove(&id).is_some()
            || self.state.penalized.remove(&id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Discards every active record. Returns how many were discarded.
    pub fn clear_active(&mut self) -> Result<usize, CoreError> {
        let count = self.state.active.len();
        self.state.active.clear();
        self.persist()?;
        Ok(count)
    }

    /// Discards every penalized record. Returns how many were discarded.
    pub fn clear_penalized(&mut self) -> Result<usize, CoreError> {
        let count = self.state.penalized.len();
        self.state.penalized.clear();
        self.persist()?;
        Ok(count)
    }

    /// Returns a copy of both collections.
    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            active: self.state.active.clone(),
            penalized: self.state.penalized.clone(),
        }
    }

    /// Writes both collections to the backend.
    pub fn persist(&self) -> Result<(), CoreError> {
        self.backend.save(&self.state)
    }

    pub fn active(&self) -> &BTreeMap<MemberId, MemberRecord> {
        &self.state.active
    }

    pub fn penalized(&self) -> &BTreeMap<MemberId, MemberRecord> {
        &self.state.penalized
    }

    pub fn is_active(&self, id: MemberId) -> bool {
        self.state.active.contains_key(&id)
    }

    pub fn is_penalized(&self, id: MemberId) -> bool {
        self.state.penalized.contains_key(&id)
    }

    /// Ids of all active members, in key order.
    pub(crate) fn active_ids(&self) -> Vec<MemberId> {
        self.state.active.keys().copied().collect()
    }

    /// Flips the notified flag without persisting. Returns false if it was already set.
    pub(crate) fn mark_notified(&mut self, id: MemberId) -> bool {
        match self.state.active.get_mut(&id) {
            Some(record) if !record.notified => {
                record.notified = true;
                true
            }
            _ => false,
        }
    }

    /// Moves an active record to the penalty list without persisting.
    pub(crate) fn penalize(&mut self, id: MemberId) -> bool {
        match self.state.active.remove(&id) {
            Some(record) => {
                self.state.penalized.insert(id, record);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for MembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipStore")
            .field("active", &self.state.active.len())
            .field("penalized", &self.state.penalized.len())
            .finish()
    }
}

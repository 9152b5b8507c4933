//! Transition engine - the periodic sweep over active members.
//!
//! Per member and per sweep exactly one of two branches may fire:
//! - past the notify threshold and not yet notified: mark notified, report for a reminder
//! - past the kick threshold and already notified: move to the penalty list
//!
//! A member idle past both thresholds is therefore reminded first and moved only on a later
//! sweep.

use crate::error::CoreError;
use crate::member::MemberId;
use crate::store::MembershipStore;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default grace period before a reminder (2 days).
pub const DEFAULT_NOTIFY_AFTER: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Default time before an unresponsive member lands on the penalty list (3 days).
pub const DEFAULT_KICK_AFTER: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Escalation thresholds, measured from the join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub notify_after: Duration,
    pub kick_after: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            notify_after: DEFAULT_NOTIFY_AFTER,
            kick_after: DEFAULT_KICK_AFTER,
        }
    }
}

impl Thresholds {
    pub fn new(notify_after: Duration, kick_after: Duration) -> Self {
        Self {
            notify_after,
            kick_after,
        }
    }

    /// Checks that the kick branch is reachable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.kick_after < self.notify_after {
            return Err(CoreError::InvalidThresholds {
                notify: self.notify_after,
                kick: self.kick_after,
            });
        }
        Ok(())
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Members reminded in this sweep, in id order.
    pub notified: Vec<MemberId>,
    /// Members moved to the penalty list in this sweep, in id order.
    pub penalized: Vec<MemberId>,
}

impl SweepReport {
    /// Returns true if the sweep changed nothing.
    pub fn is_empty(&self) -> bool {
        self.notified.is_empty() && self.penalized.is_empty()
    }
}

/// Applies the time-driven transitions to a [`MembershipStore`].
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    thresholds: Thresholds,
    notify_after: chrono::Duration,
    kick_after: chrono::Duration,
}

impl TransitionEngine {
    /// Creates an engine, rejecting thresholds that make the kick branch unreachable.
    pub fn new(thresholds: Thresholds) -> Result<Self, CoreError> {
        thresholds.validate()?;
        let out_of_range = || CoreError::InvalidThresholds {
            notify: thresholds.notify_after,
            kick: thresholds.kick_after,
        };
        Ok(Self {
            thresholds,
            notify_after: chrono::Duration::from_std(thresholds.notify_after)
                .map_err(|_| out_of_range())?,
            kick_after: chrono::Duration::from_std(thresholds.kick_after)
                .map_err(|_| out_of_range())?,
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Runs one sweep at `now` and persists the store once, even if nothing changed.
    ///
    /// If the final write fails the in-memory transitions stay applied and the error is
    /// returned. Callers that must act on the report regardless use [`Self::apply`] and
    /// persist themselves.
    pub fn sweep(
        &self,
        store: &mut MembershipStore,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, CoreError> {
        let report = self.apply(store, now);
        store.persist()?;
        Ok(report)
    }

    /// Applies the transitions at `now` in memory only.
    pub fn apply(&self, store: &mut MembershipStore, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for id in store.active_ids() {
            let Some(record) = store.active().get(&id) else {
                continue;
            };
            let elapsed = record.elapsed(now);
            let notified = record.notified;

            if elapsed >= self.notify_after && !notified {
                store.mark_notified(id);
                report.notified.push(id);
            } else if elapsed >= self.kick_after && notified {
                store.penalize(id);
                report.penalized.push(id);
            }
        }

        tracing::debug!(
            "Sweep at {}: {} notified, {} penalized",
            now,
            report.notified.len(),
            report.penalized.len()
        );

        report
    }
}

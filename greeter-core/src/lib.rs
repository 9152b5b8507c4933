//! # greeter-core
//!
//! Membership lifecycle engine for greeter.
//!
//! This crate provides:
//! - Member identity and record types
//! - The membership store (active and penalized collections, write-through persistence)
//! - The time-driven transition engine
//! - Listing helpers for the moderation commands

pub mod backend;
pub mod clock;
pub mod engine;
pub mod error;
pub mod listing;
pub mod member;
pub mod store;

pub use backend::{MemoryBackend, PersistedState, StateBackend};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{SweepReport, Thresholds, TransitionEngine};
pub use error::CoreError;
pub use listing::{render_listing, ListKind, MemberSummary};
pub use member::{MemberId, MemberRecord};
pub use store::{MembershipSnapshot, MembershipStore};

//! # greeter-server
//!
//! Service side of greeter.
//!
//! This crate provides:
//! - Configuration loading (YAML file plus environment overrides)
//! - The line-delimited JSON protocol spoken with the chat adapter
//! - Join detection from platform status updates
//! - Request handlers for joins, messages and moderation commands
//! - The daily sweep scheduler and reminder broadcasting
//! - The TCP server

pub mod broadcast;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod status;

use greeter_core::MembershipStore;
use std::sync::Arc;

/// Store handle shared by the handler and the scheduler. Every operation holds the lock for
/// its whole duration.
pub type SharedStore = Arc<parking_lot::Mutex<MembershipStore>>;

pub use broadcast::{Notification, NotificationBroadcaster};
pub use config::{ChatConfig, Config, ConfigError, NetworkConfig, StorageConfig, SweepConfig};
pub use error::ServerError;
pub use handler::CommandHandler;
pub use protocol::{AdminCommand, Mention, Request, Response, UserInfo};
pub use scheduler::SweepScheduler;
pub use server::{Server, ServerConfig, ServerStats};
pub use status::{MemberStatus, StatusChange};

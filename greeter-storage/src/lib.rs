//! # greeter-storage
//!
//! Storage layer for greeter.
//!
//! This crate provides:
//! - A single-file state backend for the membership store
//! - CRC32C corruption detection on load
//! - Atomic replacement on save (write, fsync, rename)

pub mod error;
pub mod state_file;

pub use error::StorageError;
pub use state_file::{StateFile, STATE_FORMAT_VERSION};

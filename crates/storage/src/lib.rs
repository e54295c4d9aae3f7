//! Key-value persistence for Courseplay.
//!
//! The player store writes a small JSON snapshot under a fixed key after
//! every change. This crate provides the trait it writes through plus a
//! JSON-file backend and an in-memory backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{KeyValueStore, StorageError, Result};
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;

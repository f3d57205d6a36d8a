//! TTL key-value store abstraction for progress state.
//!
//! This crate provides the narrow expiring-store port the progress engine
//! runs against, with an in-memory reference implementation. Production
//! deployments plug a distributed cache in behind the same trait.

#![warn(missing_docs)]

pub mod memory;
pub mod trait_;

pub use memory::MemoryStore;
pub use trait_::{Result, StoreError, TtlStore};

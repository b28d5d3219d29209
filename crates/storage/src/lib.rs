//! Durable record storage for the name registry.
//!
//! [`SledRegistryStore`] keeps one sled tree of JSON-encoded domain records
//! keyed by their derived 32-byte key. Writes are serialized per key through
//! [`KeyLocks`](namereg_registry::KeyLocks) and committed with
//! compare-and-swap, then flushed.

pub mod sled_store;

pub use sled_store::{SledRegistryStore, StorageError, SCHEMA_VERSION};

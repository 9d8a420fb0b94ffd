//! Durable key-value storage for the session snapshot.
//!
//! The session manager only needs "get a string by key" and "set a string
//! by key". `FileStore` keeps one JSON file per key on disk so state
//! survives restarts; `MemoryStore` lives for the process only.

pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

//! Storage module for local block persistence
//!
//! Uses sled embedded database for fast, reliable storage.

pub mod blocks;

pub use blocks::{BlockStore, StorageError};

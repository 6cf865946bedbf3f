//! Persistence collaborators for the crafting engine.
//!
//! The engine only needs a flat string key-value store:
//!
//! - [`MemStore`]: in-process, concurrent hashmap (DashMap); lost on exit
//! - [`DurableStore`]: ACID transactions in a single redb file
//!
//! Both implement [`KvStore`], the seam the engine persists through.

pub mod durable;
pub mod mem;

pub use durable::DurableStore;
pub use mem::MemStore;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A flat string key-value store.
pub trait KvStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key. Returns whether it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Short name for diagnostics.
    fn kind(&self) -> &'static str;

    /// Whether the data outlives the process.
    fn is_persistent(&self) -> bool;
}

//! ACID-durable key-value store backed by redb.
//!
//! Holds the live snapshot, its rolling backup, and archived corrupt payloads
//! in one `kv` table. Every write is its own transaction, so a crash mid-save
//! leaves the previous value intact.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::StoreError;
use crate::store::{KvStore, StoreResult};

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "craft.redb";

const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("kv");

fn redb_err(op: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

/// ACID-durable store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the table up front so read transactions never see it missing.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        txn.open_table(KV_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        txn.commit().map_err(|e| redb_err("commit", e))?;

        tracing::debug!(path = %db_path.display(), "opened durable store");
        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for DurableStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(KV_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let result = table.get(key).map_err(|e| redb_err("get", e))?;
        Ok(result.map(|guard| guard.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        {
            let mut table = txn
                .open_table(KV_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            table
                .insert(key, value)
                .map_err(|e| redb_err("insert", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        let existed = {
            let mut table = txn
                .open_table(KV_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            let result = table.remove(key).map_err(|e| redb_err("remove", e))?;
            result.is_some()
        };
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(existed)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(KV_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let range = table
            .range::<&str>(prefix..)
            .map_err(|e| redb_err("range", e))?;

        let mut keys = Vec::new();
        for item in range {
            let (key, _) = item.map_err(|e| redb_err("range", e))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    fn kind(&self) -> &'static str {
        "redb"
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

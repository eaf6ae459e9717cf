//! In-memory hex→id intern map for Hash rows (spec §4.3, §8 invariant 6): a concurrent map with
//! atomic `get_or_insert`, backed by the store's single writer thread so the map and the
//! `Hashes` table always agree on id. Grounded on the teacher's single-connection discipline,
//! generalized with `dashmap` (as used for concurrent caches throughout the example pack) instead
//! of a plain `Mutex<HashMap<_>>`, to avoid serializing hasher threads on map lookups alone.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::{EngineError, Result};
use crate::store::{Store, hashes_repo};
use crate::types::HashAlgorithm;

pub struct HashIntern {
    by_hex: DashMap<String, i64>,
}

impl HashIntern {
    pub fn new() -> Self {
        HashIntern {
            by_hex: DashMap::new(),
        }
    }

    /// Populate the map from the store's existing `Hashes` rows (call once at startup so a
    /// resumed run doesn't re-insert hashes computed in a prior session).
    pub fn prime(&self, store: &Store) -> Result<()> {
        let handle = store.acquire_read_handle()?;
        let mut stmt = handle
            .conn()
            .prepare("SELECT HashHex, Id FROM Hashes")
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        for row in rows {
            let (hex, id) = row.map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
            self.by_hex.insert(hex, id);
        }
        Ok(())
    }

    /// Atomically resolve `hash_hex` to a Hash row id, inserting a new row on first sight. The
    /// in-memory check is a fast path; the authoritative decision is the single DB round trip
    /// inside the store's writer thread, which can never race with another writer.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_insert(
        &self,
        store: &Store,
        algorithm: HashAlgorithm,
        hash_bytes: Vec<u8>,
        hash_hex: String,
        size_bytes: i64,
        partial_chunk_size_mb: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        if let Some(id) = self.by_hex.get(&hash_hex) {
            return Ok(*id);
        }
        let handle = store.acquire_write_handle();
        let hex_for_db = hash_hex.clone();
        let id = handle
            .submit(move |conn| {
                hashes_repo::get_or_create(
                    conn,
                    algorithm,
                    &hash_bytes,
                    &hex_for_db,
                    size_bytes,
                    partial_chunk_size_mb,
                    now,
                )
                .map(|(id, _is_new)| id)
            })
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        self.by_hex.insert(hash_hex, id);
        Ok(id)
    }
}

impl Default for HashIntern {
    fn default() -> Self {
        Self::new()
    }
}

//! Hash Cache: per-path `(size, modified) -> hash` memory that outlives a rescan's File Instance
//! purge (spec §4.3 "Cache semantics"). Grounded on the teacher's
//! `engine::hashing::fill_entry_hash_if_needed`, which carries a previously-computed hash forward
//! onto a re-enumerated entry when its size and mtime haven't moved; this module is the persisted
//! equivalent for a store where the old entry itself is deleted, not merely re-visited in place.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::HashCacheEntry;

fn row_to_entry(row: &Row) -> rusqlite::Result<HashCacheEntry> {
    Ok(HashCacheEntry {
        scan_root_id: row.get("ScanRootId")?,
        relative_path: row.get("RelativePath")?,
        size_bytes: row.get("SizeBytes")?,
        modified_utc: row.get::<_, DateTime<Utc>>("ModifiedUtc")?,
        hash_id: row.get("HashId")?,
    })
}

/// Look up the cached hash for `(scan_root_id, relative_path)`, if any, regardless of whether its
/// size/modified still match — callers compare those themselves before treating it as a hit.
pub fn get(
    conn: &Connection,
    scan_root_id: i64,
    relative_path: &str,
) -> rusqlite::Result<Option<HashCacheEntry>> {
    conn.query_row(
        "SELECT * FROM HashCache WHERE ScanRootId = ?1 AND RelativePath = ?2",
        params![scan_root_id, relative_path],
        row_to_entry,
    )
    .optional()
}

/// Record (or refresh) the cache entry for a freshly computed hash.
pub fn upsert(
    conn: &Connection,
    scan_root_id: i64,
    relative_path: &str,
    size_bytes: i64,
    modified_utc: DateTime<Utc>,
    hash_id: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO HashCache (ScanRootId, RelativePath, SizeBytes, ModifiedUtc, HashId)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(ScanRootId, RelativePath) DO UPDATE SET
            SizeBytes = excluded.SizeBytes,
            ModifiedUtc = excluded.ModifiedUtc,
            HashId = excluded.HashId",
        params![scan_root_id, relative_path, size_bytes, modified_utc, hash_id],
    )?;
    Ok(())
}

//! Hashes: distinct content fingerprints, interned by raw bytes (spec §3, §4.3).
//!
//! `get_or_create` is the atomic hash-interning operation: a single connection running on the
//! writer thread means the SELECT-then-INSERT below never races with another writer.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::{HashAlgorithm, HashRecord, PartialHashInfo};

fn row_to_hash(row: &Row) -> rusqlite::Result<HashRecord> {
    let partial_chunk: Option<i64> = row.get("PartialHashInfo")?;
    Ok(HashRecord {
        id: row.get("Id")?,
        hash_algorithm: HashAlgorithm::from_str_name(&row.get::<_, String>("HashAlgorithm")?)
            .unwrap_or_default(),
        hash_bytes: row.get("HashBytes")?,
        hash_hex: row.get("HashHex")?,
        size_bytes: row.get("SizeBytes")?,
        partial_hash_info: partial_chunk.map(|chunk_size_mb| PartialHashInfo { chunk_size_mb }),
        computed_utc: row.get::<_, DateTime<Utc>>("ComputedUtc")?,
    })
}

pub fn find_by_bytes(conn: &Connection, hash_bytes: &[u8]) -> rusqlite::Result<Option<HashRecord>> {
    conn.query_row(
        "SELECT * FROM Hashes WHERE HashBytes = ?1",
        params![hash_bytes],
        row_to_hash,
    )
    .optional()
}

/// Get the existing Hash row for `hash_bytes`, or insert a new one. Returns its id and whether
/// it was newly created (the latter drives Invariant 1's "first writer wins" bookkeeping).
pub fn get_or_create(
    conn: &Connection,
    algorithm: HashAlgorithm,
    hash_bytes: &[u8],
    hash_hex: &str,
    size_bytes: i64,
    partial_chunk_size_mb: Option<i64>,
    now: DateTime<Utc>,
) -> rusqlite::Result<(i64, bool)> {
    if let Some(existing) = find_by_bytes(conn, hash_bytes)? {
        return Ok((existing.id, false));
    }
    conn.execute(
        "INSERT INTO Hashes (HashAlgorithm, HashBytes, HashHex, SizeBytes, PartialHashInfo, ComputedUtc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(HashBytes) DO NOTHING",
        params![
            algorithm.as_str(),
            hash_bytes,
            hash_hex,
            size_bytes,
            partial_chunk_size_mb,
            now,
        ],
    )?;
    let is_new = conn.changes() > 0;
    let row = find_by_bytes(conn, hash_bytes)?.expect("just inserted or already present");
    Ok((row.id, is_new))
}

/// Delete Hash rows no longer referenced by any File Instance or cache entry (spec §4.1:
/// "garbage-collected when no file instance references it"; run during rescan only). A row the
/// `HashCache` still points at is kept alive even with zero current File Instances, since that's
/// exactly the row a future rescan's cache hit needs to find.
pub fn prune_orphaned(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM Hashes WHERE Id NOT IN (
            SELECT HashId FROM FileInstances WHERE HashId IS NOT NULL
         ) AND Id NOT IN (
            SELECT HashId FROM HashCache
         )",
        [],
    )
}

pub fn get_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<HashRecord>> {
    conn.query_row("SELECT * FROM Hashes WHERE Id = ?1", params![id], row_to_hash)
        .optional()
}

/// Count every Hash row ever recorded — used to enforce that `HashAlgorithm` is immutable once a
/// project has actually hashed something (spec §3, invariant 1).
pub fn count_all(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM Hashes", [], |row| row.get(0))
}

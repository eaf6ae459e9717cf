//! File Instances: one row per discovered occurrence of a file under a scan root (spec §3, §4.2).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::config::DB_INSERT_BATCH_SIZE;
use crate::types::{Candidate, Category, FileInstance, FileStatus};

fn row_to_instance(row: &Row) -> rusqlite::Result<FileInstance> {
    Ok(FileInstance {
        id: row.get("Id")?,
        scan_root_id: row.get("ScanRootId")?,
        relative_path: row.get("RelativePath")?,
        file_name: row.get("FileName")?,
        extension: row.get("Extension")?,
        size_bytes: row.get("SizeBytes")?,
        modified_utc: row.get::<_, DateTime<Utc>>("ModifiedUtc")?,
        status: FileStatus::from_str_name(&row.get::<_, String>("Status")?),
        category: Category::from_str_name(&row.get::<_, String>("Category")?),
        hash_id: row.get("HashId")?,
        discovered_utc: row.get::<_, DateTime<Utc>>("DiscoveredUtc")?,
        error_message: row.get("ErrorMessage")?,
    })
}

/// Insert a batch of enumerator candidates as `Discovered` rows, committing every
/// `DB_INSERT_BATCH_SIZE` rows (spec §4.1/§4.2). Existing `(ScanRootId, RelativePath)` pairs are
/// left untouched (silently skipped) so a rescan never clobbers progress already made on a file.
/// Returns the number of rows actually inserted.
pub fn batch_insert_candidates(
    conn: &mut Connection,
    candidates: &[Candidate],
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let mut inserted = 0usize;
    for chunk in candidates.chunks(DB_INSERT_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO FileInstances
                    (ScanRootId, RelativePath, FileName, Extension, SizeBytes, ModifiedUtc,
                     Status, Category, HashId, DiscoveredUtc, ErrorMessage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, NULL)
                 ON CONFLICT(ScanRootId, RelativePath) DO NOTHING",
            )?;
            for c in chunk {
                let n = stmt.execute(params![
                    c.scan_root_id,
                    c.relative_path,
                    c.file_name,
                    c.extension,
                    c.size_bytes,
                    c.modified_utc,
                    FileStatus::Discovered.as_str(),
                    c.category.as_str(),
                    now,
                ])?;
                inserted += n;
            }
        }
        tx.commit()?;
    }
    Ok(inserted)
}

pub fn mark_filtered_out(
    conn: &Connection,
    scan_root_id: i64,
    relative_path: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1
         WHERE ScanRootId = ?2 AND RelativePath = ?3",
        params![FileStatus::FilteredOut.as_str(), scan_root_id, relative_path],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<FileInstance>> {
    conn.query_row("SELECT * FROM FileInstances WHERE Id = ?1", params![id], row_to_instance)
        .optional()
}

/// Instances awaiting hashing (`Discovered`), in a stable order so a hasher can page through.
pub fn list_hash_pending(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<FileInstance>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM FileInstances WHERE Status = ?1 ORDER BY Id LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![FileStatus::Discovered.as_str(), limit], row_to_instance)?;
    rows.collect()
}

/// Instances awaiting hashing, largest first (spec §4.3: "ordered by size descending... to
/// parallelize the tail latency"), paged by `after_id` (exclusive) so callers can page through
/// without re-fetching already-claimed rows — ties broken by Id for a stable page boundary.
pub fn list_hash_pending_by_size_desc(
    conn: &Connection,
    limit: i64,
) -> rusqlite::Result<Vec<FileInstance>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM FileInstances WHERE Status = ?1 ORDER BY SizeBytes DESC, Id ASC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![FileStatus::Discovered.as_str(), limit], row_to_instance)?;
    rows.collect()
}

pub fn mark_hash_pending(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1 WHERE Id = ?2",
        params![FileStatus::HashPending.as_str(), id],
    )?;
    Ok(())
}

/// Record a successful hash for this instance (spec Invariant 2: non-filtered rows at or past
/// `Hashed` always carry a `HashId`).
pub fn mark_hashed(conn: &Connection, id: i64, hash_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1, HashId = ?2, ErrorMessage = NULL WHERE Id = ?3",
        params![FileStatus::Hashed.as_str(), hash_id, id],
    )?;
    Ok(())
}

pub fn mark_error(conn: &Connection, id: i64, message: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1, ErrorMessage = ?2 WHERE Id = ?3",
        params![FileStatus::Error.as_str(), message, id],
    )?;
    Ok(())
}

pub fn mark_copy_planned(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1 WHERE Id = ?2",
        params![FileStatus::CopyPlanned.as_str(), id],
    )?;
    Ok(())
}

pub fn mark_copied(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1 WHERE Id = ?2",
        params![FileStatus::Copied.as_str(), id],
    )?;
    Ok(())
}

pub fn mark_verified(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FileInstances SET Status = ?1 WHERE Id = ?2",
        params![FileStatus::Verified.as_str(), id],
    )?;
    Ok(())
}

/// All hashed instances sharing `hash_id`, used by the plan builder to group duplicates.
pub fn list_by_hash(conn: &Connection, hash_id: i64) -> rusqlite::Result<Vec<FileInstance>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM FileInstances WHERE HashId = ?1 ORDER BY Id",
    )?;
    let rows = stmt.query_map(params![hash_id], row_to_instance)?;
    rows.collect()
}

/// Distinct hash ids among hashed, non-error instances — the plan builder's grouping key set.
pub fn distinct_hashed_hash_ids(conn: &Connection) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT HashId FROM FileInstances WHERE HashId IS NOT NULL AND Status != ?1",
    )?;
    let rows = stmt.query_map(params![FileStatus::Error.as_str()], |row| row.get(0))?;
    rows.collect()
}

/// Delete all File Instances under `scan_root_id` (rescan policy, spec §4.2: "before enumerating
/// a root the orchestrator invokes `clear_root(root_id)`").
pub fn delete_by_scan_root(conn: &Connection, scan_root_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM FileInstances WHERE ScanRootId = ?1",
        params![scan_root_id],
    )
}

pub fn count_by_status(conn: &Connection, status: FileStatus) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM FileInstances WHERE Status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )
}

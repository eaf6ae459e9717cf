//! Copy Jobs: one unit of work per unique-file-to-destination materialization (spec §3, §4.5).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::{Category, CopyJob, CopyJobStatus, JobDetail};

fn row_to_job(row: &Row) -> rusqlite::Result<CopyJob> {
    Ok(CopyJob {
        id: row.get("Id")?,
        unique_file_id: row.get("UniqueFileId")?,
        destination_full_path: row.get("DestinationFullPath")?,
        status: CopyJobStatus::from_str_name(&row.get::<_, String>("Status")?),
        attempt_count: row.get("AttemptCount")?,
        last_error: row.get("LastError")?,
        started_utc: row.get("StartedUtc")?,
        completed_utc: row.get("CompletedUtc")?,
    })
}

pub fn create(
    conn: &Connection,
    unique_file_id: i64,
    destination_full_path: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO CopyJobs (UniqueFileId, DestinationFullPath, Status, AttemptCount)
         VALUES (?1, ?2, ?3, 0)",
        params![unique_file_id, destination_full_path, CopyJobStatus::Pending.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete all Copy Jobs (job (re)creation, spec §4.5: "purge existing Copy Jobs").
pub fn clear_all(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM CopyJobs", [])?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<CopyJob>> {
    conn.query_row("SELECT * FROM CopyJobs WHERE Id = ?1", params![id], row_to_job)
        .optional()
}

/// Atomically claim up to `count` pending jobs: flip them to `InProgress` and return full detail
/// (source path + expected hash/size) a copy worker needs, all within one writer-thread call so
/// no two workers can ever claim the same job (spec §4.5 claim-exclusivity invariant).
pub fn claim_pending_jobs(
    conn: &mut Connection,
    count: i64,
    now: DateTime<Utc>,
) -> rusqlite::Result<Vec<JobDetail>> {
    let tx = conn.transaction()?;
    let ids: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT Id FROM CopyJobs WHERE Status = ?1 ORDER BY Id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![CopyJobStatus::Pending.as_str(), count], |r| r.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    let mut details = Vec::with_capacity(ids.len());
    for id in &ids {
        tx.execute(
            "UPDATE CopyJobs SET Status = ?1, StartedUtc = ?2, AttemptCount = AttemptCount + 1
             WHERE Id = ?3 AND Status = ?4",
            params![
                CopyJobStatus::InProgress.as_str(),
                now,
                id,
                CopyJobStatus::Pending.as_str(),
            ],
        )?;
        let (root_path, relative_path, expected_hash_hex, expected_size_bytes, category_str, partial_chunk_size_mb): (
            String,
            String,
            String,
            i64,
            String,
            Option<i64>,
        ) = tx.query_row(
            "SELECT sr.Path, fi.RelativePath, h.HashHex, h.SizeBytes, fi.Category, h.PartialHashInfo
             FROM CopyJobs cj
             JOIN UniqueFiles uf ON uf.Id = cj.UniqueFileId
             JOIN FileInstances fi ON fi.Id = uf.RepresentativeFileInstanceId
             JOIN ScanRoots sr ON sr.Id = fi.ScanRootId
             JOIN Hashes h ON h.Id = uf.HashId
             WHERE cj.Id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )?;
        let source_full_path = std::path::Path::new(&root_path).join(&relative_path);
        let job = tx
            .query_row("SELECT * FROM CopyJobs WHERE Id = ?1", params![id], row_to_job)?;
        details.push(JobDetail {
            job,
            source_full_path,
            expected_hash_hex,
            expected_size_bytes,
            category: Category::from_str_name(&category_str),
            partial_chunk_size_mb,
        });
    }
    tx.commit()?;
    Ok(details)
}

/// Update the recorded destination path when conflict resolution renamed the file away from its
/// planned name (spec §4.5 step 9: "storing the actual destination path").
pub fn update_destination(
    conn: &Connection,
    id: i64,
    destination_full_path: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE CopyJobs SET DestinationFullPath = ?1 WHERE Id = ?2",
        params![destination_full_path, id],
    )?;
    Ok(())
}

pub fn mark_copied(conn: &Connection, id: i64, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE CopyJobs SET Status = ?1, CompletedUtc = ?2, LastError = NULL WHERE Id = ?3",
        params![CopyJobStatus::Copied.as_str(), now, id],
    )?;
    Ok(())
}

pub fn mark_verified(conn: &Connection, id: i64, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE CopyJobs SET Status = ?1, CompletedUtc = ?2 WHERE Id = ?3",
        params![CopyJobStatus::Verified.as_str(), now, id],
    )?;
    Ok(())
}

pub fn mark_skipped(conn: &Connection, id: i64, reason: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE CopyJobs SET Status = ?1, LastError = ?2 WHERE Id = ?3",
        params![CopyJobStatus::Skipped.as_str(), reason, id],
    )?;
    Ok(())
}

/// Record a failed attempt. If `attempt_count` has reached the retry ceiling, the caller passes
/// `final_failure = true` to mark the job `Error` instead of bouncing it back to `Pending`.
pub fn record_failure(
    conn: &Connection,
    id: i64,
    message: &str,
    final_failure: bool,
) -> rusqlite::Result<()> {
    let status = if final_failure {
        CopyJobStatus::Error.as_str()
    } else {
        CopyJobStatus::Pending.as_str()
    };
    conn.execute(
        "UPDATE CopyJobs SET Status = ?1, LastError = ?2 WHERE Id = ?3",
        params![status, message, id],
    )?;
    Ok(())
}

pub fn count_by_status(conn: &Connection, status: CopyJobStatus) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM CopyJobs WHERE Status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )
}

pub fn list_by_status(conn: &Connection, status: CopyJobStatus) -> rusqlite::Result<Vec<CopyJob>> {
    let mut stmt = conn.prepare("SELECT * FROM CopyJobs WHERE Status = ?1 ORDER BY Id")?;
    let rows = stmt.query_map(params![status.as_str()], row_to_job)?;
    rows.collect()
}

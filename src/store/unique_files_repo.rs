//! Unique Files: one row per distinct content (keyed by hash), carrying the copy plan (spec §3, §4.4).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::{Category, UniqueFile};

fn row_to_unique_file(row: &Row) -> rusqlite::Result<UniqueFile> {
    Ok(UniqueFile {
        id: row.get("Id")?,
        hash_id: row.get("HashId")?,
        representative_file_instance_id: row.get("RepresentativeFileInstanceId")?,
        file_type_category: Category::from_str_name(&row.get::<_, String>("FileTypeCategory")?),
        copy_enabled: row.get("CopyEnabled")?,
        planned_folder_node_id: row.get("PlannedFolderNodeId")?,
        planned_file_name: row.get("PlannedFileName")?,
        copied_utc: row.get("CopiedUtc")?,
        verified_utc: row.get("VerifiedUtc")?,
        duplicate_count: row.get("DuplicateCount")?,
    })
}

pub fn get_by_hash(conn: &Connection, hash_id: i64) -> rusqlite::Result<Option<UniqueFile>> {
    conn.query_row(
        "SELECT * FROM UniqueFiles WHERE HashId = ?1",
        params![hash_id],
        row_to_unique_file,
    )
    .optional()
}

/// Create (or replace, on rescan) the Unique File row for a hash group. One representative
/// instance is picked by the plan builder; `duplicate_count` is the group's total member count.
pub fn upsert(
    conn: &Connection,
    hash_id: i64,
    representative_file_instance_id: i64,
    file_type_category: Category,
    planned_file_name: &str,
    duplicate_count: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO UniqueFiles
            (HashId, RepresentativeFileInstanceId, FileTypeCategory, CopyEnabled,
             PlannedFolderNodeId, PlannedFileName, DuplicateCount)
         VALUES (?1, ?2, ?3, 1, NULL, ?4, ?5)
         ON CONFLICT(HashId) DO UPDATE SET
            RepresentativeFileInstanceId = excluded.RepresentativeFileInstanceId,
            FileTypeCategory = excluded.FileTypeCategory,
            PlannedFileName = excluded.PlannedFileName,
            DuplicateCount = excluded.DuplicateCount",
        params![
            hash_id,
            representative_file_instance_id,
            file_type_category.as_str(),
            planned_file_name,
            duplicate_count,
        ],
    )?;
    let row = get_by_hash(conn, hash_id)?.expect("just upserted");
    Ok(row.id)
}

pub fn set_planned_folder(
    conn: &Connection,
    id: i64,
    folder_node_id: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE UniqueFiles SET PlannedFolderNodeId = ?1 WHERE Id = ?2",
        params![folder_node_id, id],
    )?;
    Ok(())
}

pub fn set_copy_enabled(conn: &Connection, id: i64, enabled: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE UniqueFiles SET CopyEnabled = ?1 WHERE Id = ?2",
        params![enabled, id],
    )?;
    Ok(())
}

pub fn mark_copied(conn: &Connection, id: i64, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE UniqueFiles SET CopiedUtc = ?1 WHERE Id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn mark_verified(conn: &Connection, id: i64, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE UniqueFiles SET VerifiedUtc = ?1 WHERE Id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn list_copy_enabled(conn: &Connection) -> rusqlite::Result<Vec<UniqueFile>> {
    let mut stmt = conn.prepare("SELECT * FROM UniqueFiles WHERE CopyEnabled = 1 ORDER BY Id")?;
    let rows = stmt.query_map([], row_to_unique_file)?;
    rows.collect()
}

/// Delete all Unique Files (plan rebuild, spec §4.4 step 1).
pub fn clear_all(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM UniqueFiles", [])?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<UniqueFile>> {
    conn.query_row("SELECT * FROM UniqueFiles WHERE Id = ?1", params![id], row_to_unique_file)
        .optional()
}

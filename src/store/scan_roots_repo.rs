//! Scan Roots: user-chosen source directories (spec §3).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::{ScanRoot, VolumeType};

fn row_to_scan_root(row: &Row) -> rusqlite::Result<ScanRoot> {
    Ok(ScanRoot {
        id: row.get("Id")?,
        path: row.get::<_, String>("Path")?.into(),
        label: row.get("Label")?,
        root_type: VolumeType::from_str_name(&row.get::<_, String>("RootType")?),
        is_enabled: row.get("IsEnabled")?,
        last_scan_utc: row.get("LastScanUtc")?,
        file_count: row.get("FileCount")?,
        total_bytes: row.get("TotalBytes")?,
        added_utc: row.get("AddedUtc")?,
    })
}

pub fn insert_scan_root(
    conn: &Connection,
    path: &str,
    label: &str,
    root_type: VolumeType,
    now: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO ScanRoots (Path, Label, RootType, IsEnabled, LastScanUtc, FileCount, TotalBytes, AddedUtc)
         VALUES (?1, ?2, ?3, 1, NULL, 0, 0, ?4)",
        params![path, label, root_type.as_str(), now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_scan_roots(conn: &Connection) -> rusqlite::Result<Vec<ScanRoot>> {
    let mut stmt = conn.prepare("SELECT * FROM ScanRoots ORDER BY Id")?;
    let rows = stmt.query_map([], row_to_scan_root)?;
    rows.collect()
}

pub fn get_scan_root(conn: &Connection, id: i64) -> rusqlite::Result<Option<ScanRoot>> {
    conn.query_row("SELECT * FROM ScanRoots WHERE Id = ?1", params![id], row_to_scan_root)
        .optional()
}

pub fn set_enabled(conn: &Connection, id: i64, enabled: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE ScanRoots SET IsEnabled = ?1 WHERE Id = ?2",
        params![enabled, id],
    )?;
    Ok(())
}

/// Stamp scan completion and roll up discovered file count/bytes for this root.
pub fn record_scan_completed(
    conn: &Connection,
    id: i64,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE ScanRoots SET
            LastScanUtc = ?1,
            FileCount = (SELECT COUNT(*) FROM FileInstances WHERE ScanRootId = ?2),
            TotalBytes = (SELECT COALESCE(SUM(SizeBytes), 0) FROM FileInstances WHERE ScanRootId = ?2)
         WHERE Id = ?2",
        params![now, id],
    )?;
    Ok(())
}

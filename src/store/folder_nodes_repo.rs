//! Folder Nodes: the proposed destination folder tree (spec §3, §4.4).

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::FolderNode;

fn row_to_folder_node(row: &Row) -> rusqlite::Result<FolderNode> {
    Ok(FolderNode {
        id: row.get("Id")?,
        parent_id: row.get("ParentId")?,
        display_name: row.get("DisplayName")?,
        proposed_relative_path: row.get("ProposedRelativePath")?,
        user_edited_name: row.get("UserEditedName")?,
        copy_enabled: row.get("CopyEnabled")?,
        unique_count: row.get("UniqueCount")?,
        duplicate_count: row.get("DuplicateCount")?,
        total_size_bytes: row.get("TotalSizeBytes")?,
        why_explanation: row.get("WhyExplanation")?,
    })
}

pub fn get_by_path(
    conn: &Connection,
    proposed_relative_path: &str,
) -> rusqlite::Result<Option<FolderNode>> {
    conn.query_row(
        "SELECT * FROM FolderNodes WHERE ProposedRelativePath = ?1",
        params![proposed_relative_path],
        row_to_folder_node,
    )
    .optional()
}

/// Get-or-create a folder node at `proposed_relative_path` under `parent_id`. Idempotent across
/// rescans: the unique path index means a second plan-build for the same tree layout reuses rows.
pub fn get_or_create(
    conn: &Connection,
    parent_id: Option<i64>,
    display_name: &str,
    proposed_relative_path: &str,
    why_explanation: Option<&str>,
) -> rusqlite::Result<i64> {
    if let Some(existing) = get_by_path(conn, proposed_relative_path)? {
        return Ok(existing.id);
    }
    conn.execute(
        "INSERT INTO FolderNodes
            (ParentId, DisplayName, ProposedRelativePath, UserEditedName, CopyEnabled,
             UniqueCount, DuplicateCount, TotalSizeBytes, WhyExplanation)
         VALUES (?1, ?2, ?3, NULL, 1, 0, 0, 0, ?4)
         ON CONFLICT(ProposedRelativePath) DO NOTHING",
        params![parent_id, display_name, proposed_relative_path, why_explanation],
    )?;
    let row = get_by_path(conn, proposed_relative_path)?.expect("just created or already present");
    Ok(row.id)
}

/// Recompute rollups (unique/duplicate counts, total size) for one folder from its member
/// Unique Files (spec §4.4's folder summary fields).
pub fn recompute_rollup(conn: &Connection, folder_node_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FolderNodes SET
            UniqueCount = (SELECT COUNT(*) FROM UniqueFiles WHERE PlannedFolderNodeId = ?1),
            DuplicateCount = (SELECT COALESCE(SUM(DuplicateCount - 1), 0) FROM UniqueFiles WHERE PlannedFolderNodeId = ?1),
            TotalSizeBytes = (
                SELECT COALESCE(SUM(h.SizeBytes), 0)
                FROM UniqueFiles uf JOIN Hashes h ON h.Id = uf.HashId
                WHERE uf.PlannedFolderNodeId = ?1
            )
         WHERE Id = ?1",
        params![folder_node_id],
    )?;
    Ok(())
}

/// Fold `child_id`'s already-computed rollup into its parent's (spec §4.4 step 5: "parent folders
/// then aggregate their leaves"). A no-op if the folder has no parent. Callers must process
/// folders bottom-up (deepest first) so a parent only accumulates a child's totals once that
/// child's own subtree has already been folded in.
pub fn add_rollup_to_parent(conn: &Connection, child_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FolderNodes SET
            UniqueCount = UniqueCount + (SELECT UniqueCount FROM FolderNodes WHERE Id = ?1),
            DuplicateCount = DuplicateCount + (SELECT DuplicateCount FROM FolderNodes WHERE Id = ?1),
            TotalSizeBytes = TotalSizeBytes + (SELECT TotalSizeBytes FROM FolderNodes WHERE Id = ?1)
         WHERE Id = (SELECT ParentId FROM FolderNodes WHERE Id = ?1)",
        params![child_id],
    )?;
    Ok(())
}

pub fn set_copy_enabled(conn: &Connection, id: i64, enabled: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FolderNodes SET CopyEnabled = ?1 WHERE Id = ?2",
        params![enabled, id],
    )?;
    Ok(())
}

pub fn set_user_edited_name(conn: &Connection, id: i64, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE FolderNodes SET UserEditedName = ?1 WHERE Id = ?2",
        params![name, id],
    )?;
    Ok(())
}

pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<FolderNode>> {
    let mut stmt = conn.prepare("SELECT * FROM FolderNodes ORDER BY Id")?;
    let rows = stmt.query_map([], row_to_folder_node)?;
    rows.collect()
}

/// Delete all Folder Nodes (plan rebuild, spec §4.4 step 1).
pub fn clear_all(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM FolderNodes", [])?;
    Ok(())
}

/// Recursively cascade `copy_enabled = false` down a folder's descendants (spec §4.4: "disabling
/// a folder cascades... via a recursive CTE").
pub fn cascade_disable(conn: &Connection, folder_node_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "WITH RECURSIVE descendants(Id) AS (
            SELECT Id FROM FolderNodes WHERE Id = ?1
            UNION ALL
            SELECT f.Id FROM FolderNodes f JOIN descendants d ON f.ParentId = d.Id
         )
         UPDATE FolderNodes SET CopyEnabled = 0 WHERE Id IN (SELECT Id FROM descendants)",
        params![folder_node_id],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<FolderNode>> {
    conn.query_row("SELECT * FROM FolderNodes WHERE Id = ?1", params![id], row_to_folder_node)
        .optional()
}

//! Plan generation: group hashed instances into Unique Files, pick representatives, build the
//! destination folder tree, and roll up counts (spec §4.4). New relative to the teacher (which
//! has no planning stage); grounded on the teacher's transaction-per-step discipline seen in
//! `engine::db_ops::indexer::apply_index_diff` (one transaction, prepared statement reused in a
//! loop) — each numbered step below runs as one such transaction.

use chrono::Datelike;
use rusqlite::Connection;

use crate::error::{EngineError, Result};
use crate::store::{Store, copy_jobs_repo, file_instances_repo, folder_nodes_repo, unique_files_repo};
use crate::types::FileInstance;

fn pick_representative(instances: &[FileInstance]) -> &FileInstance {
    instances
        .iter()
        .min_by(|a, b| {
            a.relative_path
                .len()
                .cmp(&b.relative_path.len())
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        })
        .expect("hash group is never empty")
}

fn folder_paths_for(representative: &FileInstance) -> (String, String, String, String) {
    // (year_display, year_path, month_display, month_path)
    let year = representative.modified_utc.year();
    if !(1..=9999).contains(&year) {
        return (
            "Unknown".to_string(),
            "Unknown".to_string(),
            "Unknown".to_string(),
            "Unknown".to_string(),
        );
    }
    let year_display = format!("{:04}", year);
    let month_display = format!("{:04}-{:02}", year, representative.modified_utc.month());
    let month_path = format!("{}/{}", year_display, month_display);
    (
        year_display.clone(),
        year_display,
        month_display,
        month_path,
    )
}

/// Depth of `id` in the Folder Node tree (root = 0), memoized in `cache` since the same parent is
/// visited repeatedly when many siblings share it.
fn depth_of(
    id: i64,
    parent_of: &std::collections::HashMap<i64, Option<i64>>,
    cache: &mut std::collections::HashMap<i64, u32>,
) -> u32 {
    if let Some(&d) = cache.get(&id) {
        return d;
    }
    let d = match parent_of.get(&id).copied().flatten() {
        Some(parent_id) => depth_of(parent_id, parent_of, cache) + 1,
        None => 0,
    };
    cache.insert(id, d);
    d
}

/// Clear prior Unique Files and Folder Nodes (spec §4.4 step 1). Copy Jobs are purged first:
/// `CopyJobs.UniqueFileId` has no `ON DELETE CASCADE` and foreign keys are enforced, so a replan
/// after a completed (or in-progress) copy would otherwise fail deleting `UniqueFiles` out from
/// under jobs that still reference it.
fn build_step(conn: &mut Connection) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    copy_jobs_repo::clear_all(&tx).map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    unique_files_repo::clear_all(&tx).map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    folder_nodes_repo::clear_all(&tx).map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    tx.commit().map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    Ok(())
}

/// Run the full plan-builder pipeline against `store`: clear prior plan, group by hash, pick
/// representatives, build the year/month folder tree, assign, and roll up. `movie_chunk_size_mb`
/// is unused here (carried on the hash row already) — kept as a parameter for symmetry with the
/// hash stage's signature and possible future `why_explanation` enrichment.
pub fn build_plan(store: &Store) -> Result<PlanSummary> {
    {
        let write = store.acquire_write_handle();
        write.submit(|conn| build_step(conn))?;
    }

    let hash_ids: Vec<i64> = {
        let handle = store.acquire_read_handle()?;
        file_instances_repo::distinct_hashed_hash_ids(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
    };

    let mut unique_file_count = 0i64;
    let mut folder_count = 0i64;

    for hash_id in hash_ids {
        let instances: Vec<FileInstance> = {
            let handle = store.acquire_read_handle()?;
            file_instances_repo::list_by_hash(handle.conn(), hash_id)
                .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        };
        if instances.is_empty() {
            continue;
        }
        let representative = pick_representative(&instances).clone();
        let (year_display, year_path, month_display, month_path) =
            folder_paths_for(&representative);
        let duplicate_count = instances.len() as i64;
        let planned_file_name = representative.file_name.clone();
        let category = representative.category;
        let representative_id = representative.id;

        let write = store.acquire_write_handle();
        let folder_and_unique_id = write.submit(move |conn| -> rusqlite::Result<(i64, i64)> {
            let tx = conn.transaction()?;
            let year_node_id = folder_nodes_repo::get_or_create(
                &tx,
                None,
                &year_display,
                &year_path,
                None,
            )?;
            let month_node_id = if month_path == year_path {
                year_node_id
            } else {
                folder_nodes_repo::get_or_create(
                    &tx,
                    Some(year_node_id),
                    &month_display,
                    &month_path,
                    None,
                )?
            };
            let unique_file_id = unique_files_repo::upsert(
                &tx,
                hash_id,
                representative_id,
                category,
                &planned_file_name,
                duplicate_count,
            )?;
            unique_files_repo::set_planned_folder(&tx, unique_file_id, month_node_id)?;
            tx.commit()?;
            Ok((month_node_id, unique_file_id))
        });
        let (folder_node_id, _unique_file_id) =
            folder_and_unique_id.map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        let _ = folder_node_id;
        unique_file_count += 1;
    }

    // Roll up every folder now that assignment is complete: first each folder's own directly
    // assigned Unique Files (leaves get their real counts, parents get zero since Unique Files
    // are only ever assigned to month folders), then fold each folder's rollup into its parent,
    // deepest folders first, so a year folder ends up with its months' totals summed in (spec
    // §4.4 step 5: "parent folders then aggregate their leaves").
    let folders = {
        let handle = store.acquire_read_handle()?;
        folder_nodes_repo::list_all(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
    };
    folder_count = folders.len() as i64;

    for folder in &folders {
        let folder_id = folder.id;
        let write = store.acquire_write_handle();
        write
            .submit(move |conn| folder_nodes_repo::recompute_rollup(conn, folder_id))
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    }

    let parent_of: std::collections::HashMap<i64, Option<i64>> =
        folders.iter().map(|f| (f.id, f.parent_id)).collect();
    let mut depths: std::collections::HashMap<i64, u32> = std::collections::HashMap::new();
    for folder in &folders {
        depth_of(folder.id, &parent_of, &mut depths);
    }
    let mut ordered: Vec<i64> = folders.iter().map(|f| f.id).collect();
    ordered.sort_by_key(|id| std::cmp::Reverse(depths[id]));

    for folder_id in ordered {
        let write = store.acquire_write_handle();
        write
            .submit(move |conn| folder_nodes_repo::add_rollup_to_parent(conn, folder_id))
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    }

    Ok(PlanSummary {
        unique_file_count,
        folder_count,
    })
}

pub struct PlanSummary {
    pub unique_file_count: i64,
    pub folder_count: i64,
}

//! End-to-end pipeline smoke test: scan a tree with a duplicate pair, hash, plan, and copy it
//! into a target directory, then verify. Exercises the orchestrator's full stage sequencing
//! (spec §4.7) and the dedup invariant (spec §8: two identical files produce exactly one
//! destination copy).

use std::fs;
use std::sync::Arc;

use mediavault::pipeline::enumerator::EnumerationFilter;
use mediavault::pipeline::progress::ProgressCounters;
use mediavault::store::{scan_roots_repo, settings_repo, Store};
use mediavault::types::VolumeType;
use mediavault::PipelineOrchestrator;

fn default_filter() -> EnumerationFilter {
    EnumerationFilter {
        allowed_extensions: Default::default(),
        min_size_bytes: None,
        max_size_bytes: None,
        exclude_patterns: Vec::new(),
    }
}

#[test]
fn scan_hash_plan_copy_dedups_identical_content() {
    let source_dir = tempfile::tempdir().unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();

    fs::write(source_dir.path().join("a.jpg"), b"same bytes").unwrap();
    fs::write(source_dir.path().join("b.jpg"), b"same bytes").unwrap();
    fs::write(source_dir.path().join("c.jpg"), b"different bytes").unwrap();

    let store = Arc::new(Store::open(&project_dir.path().join("Project.db")).unwrap());
    {
        let defaults = mediavault::types::ProjectSettings::default();
        let write = store.acquire_write_handle();
        write
            .submit(move |conn| settings_repo::upsert_settings(conn, &defaults))
            .unwrap();
    }
    {
        let path = source_dir.path().to_string_lossy().to_string();
        let write = store.acquire_write_handle();
        write
            .submit(move |conn| {
                scan_roots_repo::insert_scan_root(conn, &path, "Source", VolumeType::Fixed, chrono::Utc::now())
            })
            .unwrap();
    }

    let orchestrator = PipelineOrchestrator::open(Arc::clone(&store)).unwrap();

    orchestrator.run_scan(&default_filter(), ProgressCounters::new()).unwrap();
    orchestrator.run_hash(2, ProgressCounters::new()).unwrap();
    let summary = orchestrator.run_plan().unwrap();
    assert_eq!(summary.unique_file_count, 2, "two distinct contents among three files");

    orchestrator
        .run_copy(target_dir.path(), 2, ProgressCounters::new())
        .unwrap();

    let mut copied_files = Vec::new();
    for entry in walkdir_files(target_dir.path()) {
        copied_files.push(entry);
    }
    assert_eq!(copied_files.len(), 2, "duplicate content must materialize exactly once");

    let handle = store.acquire_read_handle().unwrap();
    let settings = settings_repo::get_settings(handle.conn()).unwrap().unwrap();
    assert_eq!(settings.current_state, mediavault::types::AppState::Completed);
}

fn walkdir_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

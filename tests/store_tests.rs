//! Store round-trip tests: scan roots, file instances, hash interning, and the CopyJobs claim/
//! recovery invariants (spec §4.1, §4.3, §4.5). Grounded on the teacher's `tests/db_tests.rs`
//! style of exercising repo functions directly against a real connection.

use chrono::Utc;
use mediavault::store::{
    copy_jobs_repo, file_instances_repo, hashes_repo, scan_roots_repo, settings_repo, Store,
};
use mediavault::types::{Candidate, Category, CopyJobStatus, HashAlgorithm, VolumeType};

fn open_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("Project.db");
    let store = Store::open(&db_path).unwrap();
    (dir, store)
}

#[test]
fn settings_default_round_trip() {
    let (_dir, store) = open_store();
    let defaults = mediavault::types::ProjectSettings::default();
    {
        let write = store.acquire_write_handle();
        write
            .submit(move |conn| settings_repo::upsert_settings(conn, &defaults))
            .unwrap();
    }
    let handle = store.acquire_read_handle().unwrap();
    let loaded = settings_repo::get_settings(handle.conn()).unwrap().unwrap();
    assert_eq!(loaded.id, 1);
    assert_eq!(loaded.hash_level, HashAlgorithm::default());
}

#[test]
fn scan_root_insert_and_list() {
    let (_dir, store) = open_store();
    let write = store.acquire_write_handle();
    let id = write
        .submit(|conn| {
            scan_roots_repo::insert_scan_root(conn, "/media/photos", "Photos", VolumeType::Fixed, Utc::now())
        })
        .unwrap();
    drop(write);

    let handle = store.acquire_read_handle().unwrap();
    let roots = scan_roots_repo::list_scan_roots(handle.conn()).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, id);
    assert_eq!(roots[0].label, "Photos");
    assert!(roots[0].is_enabled);
}

#[test]
fn file_instances_order_by_size_descending() {
    let (_dir, store) = open_store();
    let write = store.acquire_write_handle();
    let root_id = write
        .submit(|conn| {
            scan_roots_repo::insert_scan_root(conn, "/media", "Media", VolumeType::Fixed, Utc::now())
        })
        .unwrap();

    let candidates = vec![
        candidate(root_id, "small.jpg", 100),
        candidate(root_id, "large.mov", 9_000),
        candidate(root_id, "medium.png", 2_000),
    ];
    write
        .submit(move |conn| file_instances_repo::batch_insert_candidates(conn, &candidates, Utc::now()))
        .unwrap();
    drop(write);

    let handle = store.acquire_read_handle().unwrap();
    let pending = file_instances_repo::list_hash_pending_by_size_desc(handle.conn(), 10).unwrap();
    let sizes: Vec<i64> = pending.iter().map(|f| f.size_bytes).collect();
    assert_eq!(sizes, vec![9_000, 2_000, 100]);
}

#[test]
fn rescan_same_relative_path_is_not_clobbered() {
    let (_dir, store) = open_store();
    let write = store.acquire_write_handle();
    let root_id = write
        .submit(|conn| {
            scan_roots_repo::insert_scan_root(conn, "/media", "Media", VolumeType::Fixed, Utc::now())
        })
        .unwrap();

    let first = vec![candidate(root_id, "a.jpg", 100)];
    write
        .submit(move |conn| file_instances_repo::batch_insert_candidates(conn, &first, Utc::now()))
        .unwrap();

    {
        let handle = store.acquire_read_handle().unwrap();
        let rows = file_instances_repo::list_hash_pending(handle.conn(), 10).unwrap();
        let id = rows[0].id;
        drop(handle);
        let write2 = store.acquire_write_handle();
        write2
            .submit(move |conn| file_instances_repo::mark_hashed(conn, id, 1))
            .unwrap();
    }

    // re-enumerate the same root; the already-hashed row must not revert to Discovered.
    let second = vec![candidate(root_id, "a.jpg", 100)];
    let write3 = store.acquire_write_handle();
    let inserted = write3
        .submit(move |conn| file_instances_repo::batch_insert_candidates(conn, &second, Utc::now()))
        .unwrap();
    assert_eq!(inserted, 0);

    let handle = store.acquire_read_handle().unwrap();
    let pending = file_instances_repo::list_hash_pending(handle.conn(), 10).unwrap();
    assert!(pending.is_empty(), "rescan must not reset a Hashed row back to Discovered");
}

#[test]
fn hash_interning_dedups_identical_bytes() {
    let (_dir, store) = open_store();
    let write = store.acquire_write_handle();
    let bytes = vec![1u8, 2, 3, 4];
    let (id1, created1) = write
        .submit({
            let bytes = bytes.clone();
            move |conn| {
                hashes_repo::get_or_create(conn, HashAlgorithm::Sha256, &bytes, "01020304", 4, None, Utc::now())
            }
        })
        .unwrap();
    assert!(created1);

    let (id2, created2) = write
        .submit(move |conn| {
            hashes_repo::get_or_create(conn, HashAlgorithm::Sha256, &bytes, "01020304", 4, None, Utc::now())
        })
        .unwrap();
    assert!(!created2);
    assert_eq!(id1, id2);
}

#[test]
fn recover_rolls_in_progress_copy_jobs_back_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("Project.db");
    {
        let store = Store::open(&db_path).unwrap();
        let write = store.acquire_write_handle();
        let job_id = write
            .submit(|conn| copy_jobs_repo::create(conn, 1, "/dest/a.jpg"))
            .unwrap();
        write
            .submit(move |conn| {
                conn.execute(
                    "UPDATE CopyJobs SET Status = 'InProgress', AttemptCount = 1 WHERE Id = ?1",
                    rusqlite::params![job_id],
                )
            })
            .unwrap();
    }

    // reopening the store must run crash recovery (spec §4.1).
    let store = Store::open(&db_path).unwrap();
    let handle = store.acquire_read_handle().unwrap();
    let job = copy_jobs_repo::get(handle.conn(), 1).unwrap().unwrap();
    assert_eq!(job.status, CopyJobStatus::Pending);
    assert_eq!(job.attempt_count, 0);
}

fn candidate(scan_root_id: i64, file_name: &str, size_bytes: i64) -> Candidate {
    Candidate {
        scan_root_id,
        relative_path: file_name.to_string(),
        file_name: file_name.to_string(),
        extension: file_name.rsplit('.').next().unwrap_or_default().to_string(),
        size_bytes,
        modified_utc: Utc::now(),
        category: Category::Other,
    }
}

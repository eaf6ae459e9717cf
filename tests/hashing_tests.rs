//! Hashing dispatch tests: known digests, SizeName's no-content-read mode, and that movie-partial
//! hashing is reproducible given the same chunk size (spec §4.3).

use mediavault::hashing::{hash_file, hash_movie_partial, hash_size_name};
use mediavault::types::HashAlgorithm;
use std::io::Write;

fn write_temp(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(bytes).unwrap();
    (dir, path)
}

#[test]
fn sha256_matches_known_digest() {
    let (_dir, path) = write_temp(b"hello world");
    let out = hash_file(HashAlgorithm::Sha256, &path, 11).unwrap();
    assert_eq!(
        out.hex,
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde"
    );
    assert!(out.partial_chunk_size_mb.is_none());
}

#[test]
fn sha1_matches_known_digest() {
    let (_dir, path) = write_temp(b"hello world");
    let out = hash_file(HashAlgorithm::Sha1, &path, 11).unwrap();
    assert_eq!(out.hex, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
}

#[test]
fn size_name_never_touches_file_contents() {
    // size + name only, no file read, so a nonexistent path is fine here.
    let out = hash_size_name(4096, "movie.mkv");
    assert!(!out.hex.is_empty());
    assert!(out.partial_chunk_size_mb.is_none());
}

#[test]
fn size_name_is_stable_for_identical_inputs() {
    let a = hash_size_name(4096, "movie.mkv");
    let b = hash_size_name(4096, "movie.mkv");
    assert_eq!(a.hex, b.hex);
    let c = hash_size_name(4096, "other.mkv");
    assert_ne!(a.hex, c.hex);
}

#[test]
fn movie_partial_hash_is_reproducible() {
    let content = vec![7u8; 5 * 1024 * 1024];
    let (_dir, path) = write_temp(&content);
    let size = content.len() as u64;
    let first = hash_movie_partial(HashAlgorithm::Sha256, &path, size, 1).unwrap();
    let second = hash_movie_partial(HashAlgorithm::Sha256, &path, size, 1).unwrap();
    assert_eq!(first.hex, second.hex);
    assert_eq!(first.partial_chunk_size_mb, Some(1));
}

#[test]
fn movie_partial_hash_differs_by_chunk_size() {
    let content = vec![9u8; 5 * 1024 * 1024];
    let (_dir, path) = write_temp(&content);
    let size = content.len() as u64;
    let with_one_mb = hash_movie_partial(HashAlgorithm::Sha256, &path, size, 1).unwrap();
    let with_two_mb = hash_movie_partial(HashAlgorithm::Sha256, &path, size, 2).unwrap();
    assert_ne!(with_one_mb.hex, with_two_mb.hex);
}

//! Public entity types for the media vault data model.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hash algorithm selected for a project. Fixed for the project's lifetime once chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha3_256,
    /// No cryptographic hash: size + file name only. Non-authoritative preview mode.
    SizeName,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha3_256 => "SHA3-256",
            HashAlgorithm::SizeName => "SizeName",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "SHA1" => Some(HashAlgorithm::Sha1),
            "SHA256" => Some(HashAlgorithm::Sha256),
            "SHA3-256" => Some(HashAlgorithm::Sha3_256),
            "SizeName" => Some(HashAlgorithm::SizeName),
            _ => None,
        }
    }

    /// True for algorithms that produce a real content fingerprint (as opposed to SizeName).
    pub fn is_authoritative(&self) -> bool {
        !matches!(self, HashAlgorithm::SizeName)
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

/// CPU profile selector: derives hasher/copy-worker counts and UI update cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuProfile {
    Eco,
    Balanced,
    Fast,
    Max,
}

impl Default for CpuProfile {
    fn default() -> Self {
        CpuProfile::Balanced
    }
}

impl CpuProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuProfile::Eco => "Eco",
            CpuProfile::Balanced => "Balanced",
            CpuProfile::Fast => "Fast",
            CpuProfile::Max => "Max",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "Eco" => Some(CpuProfile::Eco),
            "Balanced" => Some(CpuProfile::Balanced),
            "Fast" => Some(CpuProfile::Fast),
            "Max" => Some(CpuProfile::Max),
            _ => None,
        }
    }
}

/// Volume type tag for a scan root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeType {
    Fixed,
    Removable,
    Network,
    Optical,
    Unknown,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Fixed => "Fixed",
            VolumeType::Removable => "Removable",
            VolumeType::Network => "Network",
            VolumeType::Optical => "Optical",
            VolumeType::Unknown => "Unknown",
        }
    }

    pub fn from_str_name(s: &str) -> Self {
        match s {
            "Fixed" => VolumeType::Fixed,
            "Removable" => VolumeType::Removable,
            "Network" => VolumeType::Network,
            "Optical" => VolumeType::Optical,
            _ => VolumeType::Unknown,
        }
    }
}

/// File category, derived from extension at discovery time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Image,
    Movie,
    Audio,
    Document,
    Archive,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "Image",
            Category::Movie => "Movie",
            Category::Audio => "Audio",
            Category::Document => "Document",
            Category::Archive => "Archive",
            Category::Other => "Other",
        }
    }

    pub fn from_str_name(s: &str) -> Self {
        match s {
            "Image" => Category::Image,
            "Movie" => Category::Movie,
            "Audio" => Category::Audio,
            "Document" => Category::Document,
            "Archive" => Category::Archive,
            _ => Category::Other,
        }
    }

    /// Classify by lowercase extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "heic" | "heif" | "webp" | "tiff" | "tif"
            | "raw" | "cr2" | "nef" | "arw" | "dng" => Category::Image,
            "mp4" | "mov" | "avi" | "mkv" | "wmv" | "m4v" | "mpg" | "mpeg" | "webm" | "3gp" => {
                Category::Movie
            }
            "mp3" | "wav" | "flac" | "aac" | "m4a" | "ogg" | "wma" | "aiff" => Category::Audio,
            "pdf" | "doc" | "docx" | "txt" | "rtf" | "odt" | "xls" | "xlsx" | "ppt" | "pptx" => {
                Category::Document
            }
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" => Category::Archive,
            _ => Category::Other,
        }
    }
}

/// Pipeline status of a single File Instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Discovered,
    FilteredOut,
    HashPending,
    Hashed,
    CopyPlanned,
    Copied,
    Verified,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Discovered => "Discovered",
            FileStatus::FilteredOut => "FilteredOut",
            FileStatus::HashPending => "HashPending",
            FileStatus::Hashed => "Hashed",
            FileStatus::CopyPlanned => "CopyPlanned",
            FileStatus::Copied => "Copied",
            FileStatus::Verified => "Verified",
            FileStatus::Error => "Error",
        }
    }

    pub fn from_str_name(s: &str) -> Self {
        match s {
            "FilteredOut" => FileStatus::FilteredOut,
            "HashPending" => FileStatus::HashPending,
            "Hashed" => FileStatus::Hashed,
            "CopyPlanned" => FileStatus::CopyPlanned,
            "Copied" => FileStatus::Copied,
            "Verified" => FileStatus::Verified,
            "Error" => FileStatus::Error,
            _ => FileStatus::Discovered,
        }
    }

    /// Invariant 2: non-FilteredOut instances at or past this status must carry a hash reference.
    pub fn at_least_hashed(&self) -> bool {
        matches!(
            self,
            FileStatus::Hashed
                | FileStatus::CopyPlanned
                | FileStatus::Copied
                | FileStatus::Verified
        )
    }
}

/// Status of a Copy Job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyJobStatus {
    Pending,
    InProgress,
    Copied,
    Verified,
    Skipped,
    Error,
}

impl CopyJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyJobStatus::Pending => "Pending",
            CopyJobStatus::InProgress => "InProgress",
            CopyJobStatus::Copied => "Copied",
            CopyJobStatus::Verified => "Verified",
            CopyJobStatus::Skipped => "Skipped",
            CopyJobStatus::Error => "Error",
        }
    }

    pub fn from_str_name(s: &str) -> Self {
        match s {
            "InProgress" => CopyJobStatus::InProgress,
            "Copied" => CopyJobStatus::Copied,
            "Verified" => CopyJobStatus::Verified,
            "Skipped" => CopyJobStatus::Skipped,
            "Error" => CopyJobStatus::Error,
            _ => CopyJobStatus::Pending,
        }
    }
}

/// Pipeline application state, persisted in Project Settings (spec §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppState {
    Idle,
    Scanning,
    ScanPaused,
    Hashing,
    HashPaused,
    Planning,
    ReadyToCopy,
    Copying,
    CopyPaused,
    Completed,
    Faulted,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Idle => "Idle",
            AppState::Scanning => "Scanning",
            AppState::ScanPaused => "ScanPaused",
            AppState::Hashing => "Hashing",
            AppState::HashPaused => "HashPaused",
            AppState::Planning => "Planning",
            AppState::ReadyToCopy => "ReadyToCopy",
            AppState::Copying => "Copying",
            AppState::CopyPaused => "CopyPaused",
            AppState::Completed => "Completed",
            AppState::Faulted => "Faulted",
        }
    }

    pub fn from_str_name(s: &str) -> Self {
        match s {
            "Scanning" => AppState::Scanning,
            "ScanPaused" => AppState::ScanPaused,
            "Hashing" => AppState::Hashing,
            "HashPaused" => AppState::HashPaused,
            "Planning" => AppState::Planning,
            "ReadyToCopy" => AppState::ReadyToCopy,
            "Copying" => AppState::Copying,
            "CopyPaused" => AppState::CopyPaused,
            "Completed" => AppState::Completed,
            "Faulted" => AppState::Faulted,
            _ => AppState::Idle,
        }
    }
}

/// Project Settings row (single row per store, primary key pinned to 1).
#[derive(Clone, Debug)]
pub struct ProjectSettings {
    pub id: i64,
    pub project_name: String,
    pub hash_level: HashAlgorithm,
    pub cpu_profile: CpuProfile,
    pub target_path: Option<PathBuf>,
    pub current_state: AppState,
    pub verify_by_default: bool,
    pub archive_scanning_enabled: bool,
    pub archive_max_size_mb: i64,
    pub archive_nested_enabled: bool,
    pub archive_max_depth: i64,
    pub movie_hash_chunk_size_mb: i64,
    pub enabled_categories: Vec<Category>,
    pub created_utc: DateTime<Utc>,
    pub last_modified_utc: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 1,
            project_name: "Untitled Project".to_string(),
            hash_level: HashAlgorithm::default(),
            cpu_profile: CpuProfile::default(),
            target_path: None,
            current_state: AppState::Idle,
            verify_by_default: false,
            archive_scanning_enabled: false,
            archive_max_size_mb: 512,
            archive_nested_enabled: false,
            archive_max_depth: 2,
            movie_hash_chunk_size_mb: 8,
            enabled_categories: vec![
                Category::Image,
                Category::Movie,
                Category::Audio,
                Category::Document,
                Category::Archive,
                Category::Other,
            ],
            created_utc: now,
            last_modified_utc: now,
            last_error: None,
        }
    }
}

/// A user-chosen source directory.
#[derive(Clone, Debug)]
pub struct ScanRoot {
    pub id: i64,
    pub path: PathBuf,
    pub label: String,
    pub root_type: VolumeType,
    pub is_enabled: bool,
    pub last_scan_utc: Option<DateTime<Utc>>,
    pub file_count: i64,
    pub total_bytes: i64,
    pub added_utc: DateTime<Utc>,
}

/// One discovered occurrence of a file under a scan root.
#[derive(Clone, Debug)]
pub struct FileInstance {
    pub id: i64,
    pub scan_root_id: i64,
    pub relative_path: String,
    pub file_name: String,
    pub extension: String,
    pub size_bytes: i64,
    pub modified_utc: DateTime<Utc>,
    pub status: FileStatus,
    pub category: Category,
    pub hash_id: Option<i64>,
    pub discovered_utc: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Partial-hash metadata for the hybrid movie fingerprint: chunk size (MB) used to compute it,
/// recorded alongside the hash so it can be recomputed identically on verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialHashInfo {
    pub chunk_size_mb: i64,
}

/// A cached `(path, size, modified) -> hash` association, keyed by scan root and relative path,
/// surviving `clear_root`'s File Instance purge so an unchanged file is never re-hashed across a
/// rescan (spec §4.3 "Cache semantics").
#[derive(Clone, Debug)]
pub struct HashCacheEntry {
    pub scan_root_id: i64,
    pub relative_path: String,
    pub size_bytes: i64,
    pub modified_utc: DateTime<Utc>,
    pub hash_id: i64,
}

/// A distinct hash value seen in the project.
#[derive(Clone, Debug)]
pub struct HashRecord {
    pub id: i64,
    pub hash_algorithm: HashAlgorithm,
    pub hash_bytes: Vec<u8>,
    pub hash_hex: String,
    pub size_bytes: i64,
    pub partial_hash_info: Option<PartialHashInfo>,
    pub computed_utc: DateTime<Utc>,
}

/// The logical notion of one content, grouping all file instances sharing a hash.
#[derive(Clone, Debug)]
pub struct UniqueFile {
    pub id: i64,
    pub hash_id: i64,
    pub representative_file_instance_id: i64,
    pub file_type_category: Category,
    pub copy_enabled: bool,
    pub planned_folder_node_id: Option<i64>,
    pub planned_file_name: String,
    pub copied_utc: Option<DateTime<Utc>>,
    pub verified_utc: Option<DateTime<Utc>>,
    pub duplicate_count: i64,
}

/// A node in the proposed destination folder tree.
#[derive(Clone, Debug)]
pub struct FolderNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub display_name: String,
    pub proposed_relative_path: String,
    pub user_edited_name: Option<String>,
    pub copy_enabled: bool,
    pub unique_count: i64,
    pub duplicate_count: i64,
    pub total_size_bytes: i64,
    pub why_explanation: Option<String>,
}

/// One unit of work to materialize a unique file at a concrete destination path.
#[derive(Clone, Debug)]
pub struct CopyJob {
    pub id: i64,
    pub unique_file_id: i64,
    pub destination_full_path: String,
    pub status: CopyJobStatus,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub started_utc: Option<DateTime<Utc>>,
    pub completed_utc: Option<DateTime<Utc>>,
}

/// Full detail row returned by `claim_pending_jobs`: the job plus what a worker needs to execute it.
#[derive(Clone, Debug)]
pub struct JobDetail {
    pub job: CopyJob,
    pub source_full_path: PathBuf,
    pub expected_hash_hex: String,
    pub expected_size_bytes: i64,
    pub category: Category,
    pub partial_chunk_size_mb: Option<i64>,
}

/// A candidate file emitted by the enumerator, not yet persisted.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub scan_root_id: i64,
    pub relative_path: String,
    pub file_name: String,
    pub extension: String,
    pub size_bytes: i64,
    pub modified_utc: DateTime<Utc>,
    pub category: Category,
}

/// Outcome of the optional verification post-stage for one copy job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Matched,
    HashMismatch,
    SourceMissing,
    DestMissing,
    SizeMismatch,
    ReadError,
}

/// One record produced by the verification post-stage.
#[derive(Clone, Debug)]
pub struct VerificationRecord {
    pub copy_job_id: i64,
    pub outcome: VerificationOutcome,
    pub source_hash_hex: Option<String>,
    pub dest_hash_hex: Option<String>,
    pub was_renamed: bool,
}

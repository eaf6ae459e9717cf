//! Embedded schema (spec §6). Table and column names are part of the contract.

pub(crate) const WAL_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
PRAGMA cache_size = -65536;
PRAGMA foreign_keys = ON;
"#;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ProjectSettings (
    Id INTEGER PRIMARY KEY CHECK (Id = 1),
    ProjectName TEXT NOT NULL,
    HashLevel TEXT NOT NULL,
    CpuProfile TEXT NOT NULL,
    TargetPath TEXT,
    CurrentState TEXT NOT NULL,
    VerifyByDefault INTEGER NOT NULL,
    ArchiveScanningEnabled INTEGER NOT NULL,
    ArchiveMaxSizeMB INTEGER NOT NULL,
    ArchiveNestedEnabled INTEGER NOT NULL,
    ArchiveMaxDepth INTEGER NOT NULL,
    MovieHashChunkSizeMB INTEGER NOT NULL,
    EnabledCategories TEXT NOT NULL,
    CreatedUtc TEXT NOT NULL,
    LastModifiedUtc TEXT NOT NULL,
    LastError TEXT
);

CREATE TABLE IF NOT EXISTS ScanRoots (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    Path TEXT NOT NULL UNIQUE,
    Label TEXT NOT NULL,
    RootType TEXT NOT NULL,
    IsEnabled INTEGER NOT NULL,
    LastScanUtc TEXT,
    FileCount INTEGER NOT NULL DEFAULT 0,
    TotalBytes INTEGER NOT NULL DEFAULT 0,
    AddedUtc TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS Hashes (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    HashAlgorithm TEXT NOT NULL,
    HashBytes BLOB NOT NULL UNIQUE,
    HashHex TEXT NOT NULL,
    SizeBytes INTEGER NOT NULL,
    PartialHashInfo TEXT,
    ComputedUtc TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hashes_hex ON Hashes(HashHex);

CREATE TABLE IF NOT EXISTS FileInstances (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    ScanRootId INTEGER NOT NULL REFERENCES ScanRoots(Id) ON DELETE CASCADE,
    RelativePath TEXT NOT NULL,
    FileName TEXT NOT NULL,
    Extension TEXT NOT NULL,
    SizeBytes INTEGER NOT NULL,
    ModifiedUtc TEXT NOT NULL,
    Status TEXT NOT NULL,
    Category TEXT NOT NULL,
    HashId INTEGER REFERENCES Hashes(Id),
    DiscoveredUtc TEXT NOT NULL,
    ErrorMessage TEXT,
    UNIQUE(ScanRootId, RelativePath)
);
CREATE INDEX IF NOT EXISTS idx_file_instances_extension ON FileInstances(Extension);
CREATE INDEX IF NOT EXISTS idx_file_instances_status ON FileInstances(Status);
CREATE INDEX IF NOT EXISTS idx_file_instances_scan_root ON FileInstances(ScanRootId);
CREATE INDEX IF NOT EXISTS idx_file_instances_hash ON FileInstances(HashId);
CREATE INDEX IF NOT EXISTS idx_file_instances_size ON FileInstances(SizeBytes);

-- Survives `clear_root`'s File Instance purge (spec §4.3 "Cache semantics"): keyed by the path a
-- File Instance would be recreated at, not by FileInstances.Id, precisely so a rescan can still
-- find it after the instance it was computed from is gone.
CREATE TABLE IF NOT EXISTS HashCache (
    ScanRootId INTEGER NOT NULL REFERENCES ScanRoots(Id) ON DELETE CASCADE,
    RelativePath TEXT NOT NULL,
    SizeBytes INTEGER NOT NULL,
    ModifiedUtc TEXT NOT NULL,
    HashId INTEGER NOT NULL REFERENCES Hashes(Id),
    PRIMARY KEY (ScanRootId, RelativePath)
);

CREATE TABLE IF NOT EXISTS FolderNodes (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    ParentId INTEGER REFERENCES FolderNodes(Id),
    DisplayName TEXT NOT NULL,
    ProposedRelativePath TEXT NOT NULL UNIQUE,
    UserEditedName TEXT,
    CopyEnabled INTEGER NOT NULL DEFAULT 1,
    UniqueCount INTEGER NOT NULL DEFAULT 0,
    DuplicateCount INTEGER NOT NULL DEFAULT 0,
    TotalSizeBytes INTEGER NOT NULL DEFAULT 0,
    WhyExplanation TEXT
);
CREATE INDEX IF NOT EXISTS idx_folder_nodes_parent ON FolderNodes(ParentId);

CREATE TABLE IF NOT EXISTS UniqueFiles (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    HashId INTEGER NOT NULL UNIQUE REFERENCES Hashes(Id),
    RepresentativeFileInstanceId INTEGER NOT NULL REFERENCES FileInstances(Id),
    FileTypeCategory TEXT NOT NULL,
    CopyEnabled INTEGER NOT NULL DEFAULT 1,
    PlannedFolderNodeId INTEGER REFERENCES FolderNodes(Id),
    PlannedFileName TEXT NOT NULL,
    CopiedUtc TEXT,
    VerifiedUtc TEXT,
    DuplicateCount INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_unique_files_folder ON UniqueFiles(PlannedFolderNodeId);

CREATE TABLE IF NOT EXISTS CopyJobs (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    UniqueFileId INTEGER NOT NULL REFERENCES UniqueFiles(Id),
    DestinationFullPath TEXT NOT NULL,
    Status TEXT NOT NULL,
    AttemptCount INTEGER NOT NULL DEFAULT 0,
    LastError TEXT,
    StartedUtc TEXT,
    CompletedUtc TEXT
);
CREATE INDEX IF NOT EXISTS idx_copy_jobs_status ON CopyJobs(Status);
CREATE INDEX IF NOT EXISTS idx_copy_jobs_unique_file ON CopyJobs(UniqueFileId);
"#;

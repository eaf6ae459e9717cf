//! Project Settings: single row pinned to Id = 1 (spec §3).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::types::{AppState, Category, CpuProfile, HashAlgorithm, ProjectSettings};

fn parse_categories(s: &str) -> Vec<Category> {
    s.split(',')
        .filter(|p| !p.is_empty())
        .map(Category::from_str_name)
        .collect()
}

fn format_categories(cats: &[Category]) -> String {
    cats.iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn row_to_settings(row: &Row) -> rusqlite::Result<ProjectSettings> {
    Ok(ProjectSettings {
        id: row.get("Id")?,
        project_name: row.get("ProjectName")?,
        hash_level: HashAlgorithm::from_str_name(&row.get::<_, String>("HashLevel")?)
            .unwrap_or_default(),
        cpu_profile: CpuProfile::from_str_name(&row.get::<_, String>("CpuProfile")?)
            .unwrap_or_default(),
        target_path: row
            .get::<_, Option<String>>("TargetPath")?
            .map(Into::into),
        current_state: AppState::from_str_name(&row.get::<_, String>("CurrentState")?),
        verify_by_default: row.get("VerifyByDefault")?,
        archive_scanning_enabled: row.get("ArchiveScanningEnabled")?,
        archive_max_size_mb: row.get("ArchiveMaxSizeMB")?,
        archive_nested_enabled: row.get("ArchiveNestedEnabled")?,
        archive_max_depth: row.get("ArchiveMaxDepth")?,
        movie_hash_chunk_size_mb: row.get("MovieHashChunkSizeMB")?,
        enabled_categories: parse_categories(&row.get::<_, String>("EnabledCategories")?),
        created_utc: row.get::<_, DateTime<Utc>>("CreatedUtc")?,
        last_modified_utc: row.get::<_, DateTime<Utc>>("LastModifiedUtc")?,
        last_error: row.get("LastError")?,
    })
}

pub fn get_settings(conn: &Connection) -> rusqlite::Result<Option<ProjectSettings>> {
    conn.query_row(
        "SELECT * FROM ProjectSettings WHERE Id = 1",
        [],
        row_to_settings,
    )
    .optional()
}

/// Insert the single settings row if absent, else overwrite it in place (Id stays 1).
pub fn upsert_settings(conn: &Connection, settings: &ProjectSettings) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO ProjectSettings (
            Id, ProjectName, HashLevel, CpuProfile, TargetPath, CurrentState,
            VerifyByDefault, ArchiveScanningEnabled, ArchiveMaxSizeMB,
            ArchiveNestedEnabled, ArchiveMaxDepth, MovieHashChunkSizeMB,
            EnabledCategories, CreatedUtc, LastModifiedUtc, LastError
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(Id) DO UPDATE SET
            ProjectName = excluded.ProjectName,
            HashLevel = excluded.HashLevel,
            CpuProfile = excluded.CpuProfile,
            TargetPath = excluded.TargetPath,
            CurrentState = excluded.CurrentState,
            VerifyByDefault = excluded.VerifyByDefault,
            ArchiveScanningEnabled = excluded.ArchiveScanningEnabled,
            ArchiveMaxSizeMB = excluded.ArchiveMaxSizeMB,
            ArchiveNestedEnabled = excluded.ArchiveNestedEnabled,
            ArchiveMaxDepth = excluded.ArchiveMaxDepth,
            MovieHashChunkSizeMB = excluded.MovieHashChunkSizeMB,
            EnabledCategories = excluded.EnabledCategories,
            LastModifiedUtc = excluded.LastModifiedUtc,
            LastError = excluded.LastError",
        params![
            settings.project_name,
            settings.hash_level.as_str(),
            settings.cpu_profile.as_str(),
            settings.target_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            settings.current_state.as_str(),
            settings.verify_by_default,
            settings.archive_scanning_enabled,
            settings.archive_max_size_mb,
            settings.archive_nested_enabled,
            settings.archive_max_depth,
            settings.movie_hash_chunk_size_mb,
            format_categories(&settings.enabled_categories),
            settings.created_utc,
            settings.last_modified_utc,
            settings.last_error,
        ],
    )?;
    Ok(())
}

/// Move the pipeline to `state`, stamping `LastModifiedUtc`. Used by the state machine (§4.7).
pub fn set_state(conn: &Connection, state: AppState, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE ProjectSettings SET CurrentState = ?1, LastModifiedUtc = ?2 WHERE Id = 1",
        params![state.as_str(), now],
    )?;
    Ok(())
}

pub fn set_last_error(
    conn: &Connection,
    message: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE ProjectSettings SET LastError = ?1, LastModifiedUtc = ?2 WHERE Id = 1",
        params![message, now],
    )?;
    Ok(())
}

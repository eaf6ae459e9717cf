//! Loads `.mediavault.toml` from a project directory (CLI only), analogous to the teacher's
//! `.nefaxer.toml`/`utils::nefaxer_toml`. Pre-seeds settings before CLI flags are applied; CLI
//! flags passed explicitly always win.

use std::path::Path;

use serde::Deserialize;

use crate::types::ProjectSettings;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProjectToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    verify_by_default: Option<bool>,
    cpu_profile: Option<String>,
    archive_scanning_enabled: Option<bool>,
    archive_max_size_mb: Option<i64>,
    archive_nested_enabled: Option<bool>,
    archive_max_depth: Option<i64>,
    movie_hash_chunk_size_mb: Option<i64>,
}

/// Load `.mediavault.toml` from `dir`, or `None` if absent or unreadable.
pub(crate) fn load(dir: &Path) -> Option<ProjectToml> {
    let path = dir.join(".mediavault.toml");
    let text = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&text)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Apply file-provided settings onto `settings`, leaving fields the file doesn't mention alone.
/// Call before CLI-flag overrides so flags still win.
pub(crate) fn apply(file: &ProjectToml, settings: &mut ProjectSettings) {
    let s = &file.settings;
    if let Some(v) = s.verify_by_default {
        settings.verify_by_default = v;
    }
    if let Some(ref profile) = s.cpu_profile
        && let Ok(parsed) = super::commands::parse_cpu_profile(profile)
    {
        settings.cpu_profile = parsed;
    }
    if let Some(v) = s.archive_scanning_enabled {
        settings.archive_scanning_enabled = v;
    }
    if let Some(v) = s.archive_max_size_mb {
        settings.archive_max_size_mb = v;
    }
    if let Some(v) = s.archive_nested_enabled {
        settings.archive_nested_enabled = v;
    }
    if let Some(v) = s.archive_max_depth {
        settings.archive_max_depth = v;
    }
    if let Some(v) = s.movie_hash_chunk_size_mb {
        settings.movie_hash_chunk_size_mb = v;
    }
}

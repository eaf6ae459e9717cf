//! Path and filter helpers, adapted from the teacher's `engine::tools` module.

use std::path::Path;

/// Normalize a path for DB storage: forward slashes only, portable across Windows/Unix.
pub fn path_to_db_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// OS-specific junk files that never count as candidates, regardless of extension filters.
pub fn is_os_hidden_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    matches!(
        name,
        ".DS_Store" | ".AppleDouble" | ".LSOverride" | "Thumbs.db" | "ehthumbs.db"
            | "Desktop.ini" | "$RECYCLE.BIN" | ".directory"
    ) || name.starts_with("._")
}

/// Simple glob matcher supporting `*` and `?`, used for user-configured exclude patterns.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
    let mut pattern_chars = pattern.chars().peekable();
    let mut text_chars = text.chars().peekable();

    while let Some(&p) = pattern_chars.peek() {
        match p {
            '*' => {
                pattern_chars.next();
                if pattern_chars.peek().is_none() {
                    return true;
                }
                while text_chars.peek().is_some() {
                    if glob_match(
                        &pattern_chars.clone().collect::<String>(),
                        &text_chars.clone().collect::<String>(),
                    ) {
                        return true;
                    }
                    text_chars.next();
                }
                return false;
            }
            '?' => {
                pattern_chars.next();
                if text_chars.next().is_none() {
                    return false;
                }
            }
            _ => {
                pattern_chars.next();
                if text_chars.next() != Some(p) {
                    return false;
                }
            }
        }
    }
    text_chars.peek().is_none()
}

/// Lowercase extension without the leading dot, or empty string if there is none.
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// True if `path` is owned by uid 0. Adapted from the teacher's
/// `engine::tools::check_for_root`/`check_root_and_canonicalize`, which refuse to index a
/// root-owned path outright. A backup engine may legitimately need to read such a path, so here
/// it is advisory only — callers log a warning and proceed.
#[cfg(unix)]
pub fn is_root_owned(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path)
        .map(|meta| meta.uid() == 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_root_owned(_path: &Path) -> bool {
    false
}

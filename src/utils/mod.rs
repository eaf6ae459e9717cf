//! Small filesystem helpers layered on top of [`crate::config::PackagePaths`].

pub mod tempfiles;

use std::path::{Path, PathBuf};

/// On-disk layout of one project directory (spec §6): the embedded store plus its `Logs/` folder.
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(crate::config::PackagePaths::get().db_filename())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(crate::config::PackagePaths::get().logs_dir_name())
    }

    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

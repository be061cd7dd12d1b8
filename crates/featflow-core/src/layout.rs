//! The three feature roots and the per-feature directory tree under them.

use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::feature::Feature;
use crate::paths;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Root {
    Wip,
    Completed,
    Archive,
}

impl Root {
    pub fn as_str(self) -> &'static str {
        match self {
            Root::Wip => "wip",
            Root::Completed => "completed",
            Root::Archive => "archive",
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PlanningDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanningDocument {
    pub path: PathBuf,
    /// Relative to the feature directory, e.g. `planning/api_plan_1.md`.
    pub relative_path: String,
    pub filename: String,
}

fn is_plan_document(filename: &str) -> bool {
    filename.contains("_plan_") && filename.ends_with(".md")
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Layout {
    wip: PathBuf,
    completed: PathBuf,
    archive: PathBuf,
}

impl Layout {
    pub fn new(
        wip: impl Into<PathBuf>,
        completed: impl Into<PathBuf>,
        archive: impl Into<PathBuf>,
    ) -> Self {
        Self {
            wip: wip.into(),
            completed: completed.into(),
            archive: archive.into(),
        }
    }

    /// Resolve the configured roots; relative entries are taken relative to
    /// `project_root`.
    pub fn from_config(project_root: &Path, cfg: &Config) -> Self {
        Self::new(
            project_root.join(&cfg.roots.wip),
            project_root.join(&cfg.roots.completed),
            project_root.join(&cfg.roots.archive),
        )
    }

    pub fn root(&self, root: Root) -> &Path {
        match root {
            Root::Wip => &self.wip,
            Root::Completed => &self.completed,
            Root::Archive => &self.archive,
        }
    }

    /// Which root directly contains `dir`, if any.
    pub fn root_of(&self, dir: &Path) -> Option<Root> {
        let parent = dir.parent()?;
        [Root::Wip, Root::Completed, Root::Archive]
            .into_iter()
            .find(|&r| self.root(r) == parent)
    }

    pub fn ensure_roots_exist(&self) -> Result<()> {
        for dir in [&self.wip, &self.completed, &self.archive] {
            crate::io::ensure_dir(dir)?;
        }
        tracing::debug!(wip = %self.wip.display(), "feature roots ensured");
        Ok(())
    }

    /// Fails with `RootMissing` for the first root that is not a directory.
    pub fn check_roots(&self) -> Result<()> {
        for dir in [&self.wip, &self.completed, &self.archive] {
            if !dir.is_dir() {
                return Err(FlowError::RootMissing(dir.clone()));
            }
        }
        Ok(())
    }

    pub fn feature_directory(&self, root: Root, name: &str) -> PathBuf {
        self.root(root).join(name)
    }

    /// Create `<wip>/<name>`. An existing path is `AlreadyExists`.
    pub fn create_feature_directory(&self, name: &str) -> Result<PathBuf> {
        if !self.wip.is_dir() {
            return Err(FlowError::RootMissing(self.wip.clone()));
        }
        let dir = self.feature_directory(Root::Wip, name);
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(FlowError::AlreadyExists(dir))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn create_subdirectories(&self, dir: &Path) -> Result<()> {
        for sub in paths::SUBDIRECTORIES {
            crate::io::ensure_dir(&dir.join(sub))?;
        }
        Ok(())
    }

    /// Relocate the feature's whole directory from `from` to `to`, keeping
    /// its directory name, and update `feature.path`.
    pub fn move_between_roots(&self, feature: &mut Feature, from: Root, to: Root) -> Result<()> {
        let dir_name = feature
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| feature.name.clone().into());
        let source = self.root(from).join(&dir_name);
        let dest = self.root(to).join(&dir_name);
        self.relocate(feature, &source, &dest)?;
        tracing::info!(
            feature = %feature.name,
            from = %from,
            to = %to,
            "feature moved between roots"
        );
        Ok(())
    }

    /// Move the feature into the archive root under a timestamp-suffixed
    /// directory name.
    pub fn archive(&self, feature: &mut Feature, from: Root) -> Result<()> {
        let source = feature.path.clone();
        if self.root_of(&source) != Some(from) {
            return Err(FlowError::SourceMissing(self.feature_directory(from, &feature.name)));
        }
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let dest = self
            .archive
            .join(format!("{}-{stamp}", feature.name));
        self.relocate(feature, &source, &dest)?;
        tracing::info!(
            feature = %feature.name,
            path = %dest.display(),
            "feature archived"
        );
        Ok(())
    }

    fn relocate(&self, feature: &mut Feature, source: &Path, dest: &Path) -> Result<()> {
        if !source.is_dir() {
            return Err(FlowError::SourceMissing(source.to_path_buf()));
        }
        if dest.exists() {
            return Err(FlowError::DestinationExists(dest.to_path_buf()));
        }
        match std::fs::rename(source, dest) {
            Ok(()) => {}
            Err(e) if is_cross_device(&e) => {
                crate::io::copy_dir_all(source, dest)?;
                std::fs::remove_dir_all(source)?;
            }
            Err(e) => return Err(e.into()),
        }
        feature.path = dest.to_path_buf();
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------------------

    /// Immediate subdirectories of `root`, sorted by name.
    pub fn feature_dirs(&self, root: Root) -> Result<Vec<PathBuf>> {
        let dir = self.root(root);
        if !dir.is_dir() {
            return Err(FlowError::RootMissing(dir.to_path_buf()));
        }
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let kind = entry.and_then(|e| Ok((e.file_type()?.is_dir(), e.path())));
            match kind {
                Ok((true, path)) => dirs.push(path),
                Ok((false, _)) => {}
                Err(e) => {
                    tracing::warn!(root = %root, error = %e, "skipping unreadable entry");
                }
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// `planning/` files following the `*_plan_*.md` naming convention.
    pub fn planning_documents(&self, feature: &Feature) -> Result<Vec<PlanningDocument>> {
        let planning = feature.planning_dir();
        if !planning.is_dir() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        for entry in std::fs::read_dir(&planning)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            if is_plan_document(&filename) {
                docs.push(PlanningDocument {
                    path: entry.path(),
                    relative_path: format!("{}/{filename}", paths::PLANNING_DIR),
                    filename,
                });
            }
        }
        docs.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(docs)
    }
}

/// `rename` cannot cross filesystems; those moves fall back to copy + delete.
#[cfg(unix)]
fn is_cross_device(e: &std::io::Error) -> bool {
    const EXDEV: i32 = 18;
    e.raw_os_error() == Some(EXDEV)
}

#[cfg(windows)]
fn is_cross_device(e: &std::io::Error) -> bool {
    const ERROR_NOT_SAME_DEVICE: i32 = 17;
    e.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &std::io::Error) -> bool {
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

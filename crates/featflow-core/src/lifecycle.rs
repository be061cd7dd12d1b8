//! Orchestration surface over layout, persistence and locking.

use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::feature::Feature;
use crate::layout::{Layout, PlanningDocument, Root};
use crate::lock::LockManager;
use crate::paths;
use crate::phase::Phase;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Lifecycle {
    layout: Layout,
    locks: LockManager,
}

impl Lifecycle {
    pub fn new(layout: Layout, locks: LockManager) -> Self {
        Self { layout, locks }
    }

    /// Load the project's config and verify its roots exist.
    pub fn open(project_root: &Path) -> Result<Self> {
        let cfg = Config::load(project_root)?;
        let lifecycle = Self::new(
            Layout::from_config(project_root, &cfg),
            LockManager::new(cfg.lock.timeout()),
        );
        lifecycle.layout.check_roots()?;
        Ok(lifecycle)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    // ---------------------------------------------------------------------------
    // Creation and lookup
    // ---------------------------------------------------------------------------

    /// Create a feature in the work-in-progress root. The new feature is
    /// left locked by this process.
    pub fn create_feature(
        &self,
        name: &str,
        parent_feature: Option<String>,
        parent_relationship: Option<String>,
    ) -> Result<Feature> {
        paths::validate_name(name)?;
        self.layout.check_roots()?;

        let completed = self.layout.feature_directory(Root::Completed, name);
        if completed.exists() {
            return Err(FlowError::AlreadyExists(completed));
        }

        let dir = self.layout.create_feature_directory(name)?;
        self.layout.create_subdirectories(&dir)?;
        let feature = Feature::create_new(name, &dir, parent_feature, parent_relationship)?;
        self.locks.acquire(&feature)?;

        tracing::info!(feature = %name, path = %dir.display(), "feature created");
        Ok(feature)
    }

    /// Look in wip then completed. A file that fails to parse is reported as
    /// not found; use [`Lifecycle::load_feature`] to see the error.
    pub fn find_feature(&self, name: &str) -> Option<Feature> {
        for root in [Root::Wip, Root::Completed] {
            let file = self.manifest_in(root, name);
            if !file.is_file() {
                continue;
            }
            match Feature::load(&file) {
                Ok(feature) => return Some(feature),
                Err(e) => {
                    tracing::debug!(feature = %name, error = %e, "feature file unreadable");
                    return None;
                }
            }
        }
        None
    }

    /// Like [`Lifecycle::find_feature`] but propagates `NotFound` and
    /// `CorruptedState`.
    pub fn load_feature(&self, name: &str) -> Result<Feature> {
        for root in [Root::Wip, Root::Completed] {
            let file = self.manifest_in(root, name);
            if file.is_file() {
                return Feature::load(&file);
            }
        }
        Err(FlowError::NotFound(name.to_string()))
    }

    fn manifest_in(&self, root: Root, name: &str) -> std::path::PathBuf {
        paths::manifest_path(&self.layout.feature_directory(root, name), name)
    }

    pub fn list_all(&self) -> Result<Vec<Feature>> {
        self.list(Root::Wip)
    }

    pub fn list_completed(&self) -> Result<Vec<Feature>> {
        self.list(Root::Completed)
    }

    pub fn list_archived(&self) -> Result<Vec<Feature>> {
        self.list(Root::Archive)
    }

    /// Features under `root`, oldest first. Directories whose feature file
    /// is missing or fails to parse are skipped.
    fn list(&self, root: Root) -> Result<Vec<Feature>> {
        let mut features = Vec::new();
        for dir in self.layout.feature_dirs(root)? {
            let file = match find_manifest(&dir) {
                Ok(Some(file)) => file,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
                    continue;
                }
            };
            match Feature::load(&file) {
                Ok(f) => features.push(f),
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "skipping unreadable feature");
                }
            }
        }
        features.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(features)
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    pub fn transition_feature(&self, feature: &mut Feature, target: Phase) -> Result<()> {
        if !feature.phase.can_transition_to(target) {
            return Err(FlowError::InvalidPhaseTransition {
                from: feature.phase,
                to: target,
            });
        }
        self.locks.check_lock(feature)?;

        let from = feature.phase;
        let mut updated = feature.clone();
        updated.phase = target;
        updated.touch();
        updated.save()?;
        *feature = updated;

        tracing::info!(feature = %feature.name, from = %from, to = %target, "phase transitioned");
        Ok(())
    }

    /// Persist accumulated changes after a lock check.
    pub fn save_feature(&self, feature: &Feature) -> Result<()> {
        self.locks.check_lock(feature)?;
        feature.save()
    }

    pub fn move_feature(&self, feature: &mut Feature, from: Root, to: Root) -> Result<()> {
        self.locks.check_lock(feature)?;
        self.layout.move_between_roots(feature, from, to)
    }

    /// Move to the archive root and drop the lock so archived directories
    /// carry none.
    pub fn archive_feature(&self, feature: &mut Feature) -> Result<()> {
        let from = self
            .root_of(feature)
            .ok_or_else(|| FlowError::SourceMissing(feature.path.clone()))?;
        self.locks.check_lock(feature)?;
        self.layout.archive(feature, from)?;
        self.locks.release(feature)
    }

    pub fn root_of(&self, feature: &Feature) -> Option<Root> {
        self.layout.root_of(&feature.path)
    }

    pub fn planning_documents(&self, feature: &Feature) -> Result<Vec<PlanningDocument>> {
        self.layout.planning_documents(feature)
    }

    // ---------------------------------------------------------------------------
    // Locking
    // ---------------------------------------------------------------------------

    pub fn lock_feature(&self, feature: &Feature) -> Result<()> {
        self.locks.acquire(feature)
    }

    pub fn unlock_feature(&self, feature: &Feature) -> Result<()> {
        self.locks.release(feature)
    }

    /// Run `f` while holding the feature's lock. A lock taken here is
    /// released afterwards whether `f` succeeds or fails; a lock this process
    /// already held is left in place.
    pub fn with_lock<T>(
        &self,
        feature: &mut Feature,
        f: impl FnOnce(&Self, &mut Feature) -> Result<T>,
    ) -> Result<T> {
        if self.locks.is_held_by_self(feature) {
            return f(self, feature);
        }
        self.locks.acquire(feature)?;
        let result = f(self, feature);
        let released = self.locks.release(feature);
        let value = result?;
        released?;
        Ok(value)
    }
}

/// The `_<name>.md` file in `dir`. Archived directories carry a timestamp
/// suffix, so the name is discovered rather than derived from the directory.
fn find_manifest(dir: &Path) -> Result<Option<std::path::PathBuf>> {
    if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
        let direct = paths::manifest_path(dir, name);
        if direct.is_file() {
            return Ok(Some(direct));
        }
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let filename = entry.file_name();
        let filename = filename.to_string_lossy();
        if filename.starts_with('_') && filename.ends_with(".md") && entry.file_type()?.is_file() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn lifecycle(dir: &TempDir) -> Lifecycle {
        let layout = Layout::new(
            dir.path().join("wip"),
            dir.path().join("completed"),
            dir.path().join("archive"),
        );
        layout.ensure_roots_exist().unwrap();
        Lifecycle::new(layout, LockManager::new(Duration::minutes(60)))
    }

    #[test]
    fn create_feature_validates_name() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        for bad in ["Invalid_Name", "invalid name", ""] {
            assert!(matches!(
                lc.create_feature(bad, None, None),
                Err(FlowError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn create_feature_builds_tree_and_holds_lock() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let f = lc.create_feature("valid-name-123", None, None).unwrap();

        let base = dir.path().join("wip/valid-name-123");
        assert!(base.join("_valid-name-123.md").is_file());
        assert!(base.join("planning").is_dir());
        assert!(base.join("research").is_dir());
        assert!(base.join("assets").is_dir());
        assert!(lc.locks().is_held_by_self(&f));
    }

    #[test]
    fn create_feature_rejects_name_taken_in_completed() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("taken", None, None).unwrap();
        lc.move_feature(&mut f, Root::Wip, Root::Completed).unwrap();
        assert!(matches!(
            lc.create_feature("taken", None, None),
            Err(FlowError::AlreadyExists(_))
        ));
    }

    #[test]
    fn open_requires_config_and_roots() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Lifecycle::open(dir.path()),
            Err(FlowError::NotInitialized)
        ));
        Config::new().save(dir.path()).unwrap();
        assert!(matches!(
            Lifecycle::open(dir.path()),
            Err(FlowError::RootMissing(_))
        ));
        Layout::from_config(dir.path(), &Config::new())
            .ensure_roots_exist()
            .unwrap();
        Lifecycle::open(dir.path()).unwrap();
    }

    #[test]
    fn find_feature_misses_and_hits() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        assert!(lc.find_feature("nope").is_none());
        assert!(matches!(
            lc.load_feature("nope"),
            Err(FlowError::NotFound(_))
        ));
        lc.create_feature("here", None, None).unwrap();
        assert_eq!(lc.find_feature("here").unwrap().name, "here");
    }

    #[test]
    fn find_feature_hides_corruption_load_feature_reports_it() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let f = lc.create_feature("broken", None, None).unwrap();
        std::fs::write(f.manifest_path(), "# no frontmatter here").unwrap();

        assert!(lc.find_feature("broken").is_none());
        assert!(matches!(
            lc.load_feature("broken"),
            Err(FlowError::CorruptedState { .. })
        ));
    }

    #[test]
    fn transition_checks_edge_before_lock() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("edge", None, None).unwrap();
        lc.unlock_feature(&f).unwrap();

        match lc.transition_feature(&mut f, Phase::Execution) {
            Err(FlowError::InvalidPhaseTransition { from, to }) => {
                assert_eq!(from, Phase::Description);
                assert_eq!(to, Phase::Execution);
            }
            other => panic!("expected InvalidPhaseTransition, got {other:?}"),
        }
        assert!(lc.locks().read(&f).unwrap().is_none());
        assert_eq!(f.phase, Phase::Description);
    }

    #[test]
    fn transition_persists_and_takes_lock() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("step", None, None).unwrap();
        lc.unlock_feature(&f).unwrap();
        let before = f.last_updated;

        lc.transition_feature(&mut f, Phase::Planning).unwrap();
        assert!(lc.locks().is_held_by_self(&f));

        let reloaded = Feature::load(&f.manifest_path()).unwrap();
        assert_eq!(reloaded.phase, Phase::Planning);
        assert!(reloaded.last_updated > before);
    }

    #[test]
    fn transition_blocked_by_foreign_lock() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("contended", None, None).unwrap();

        let other = Lifecycle::new(
            lc.layout().clone(),
            LockManager::with_identity(Duration::minutes(60), 4_000_000, "other"),
        );
        assert!(matches!(
            other.transition_feature(&mut f, Phase::Planning),
            Err(FlowError::FeatureLocked { .. })
        ));
        let reloaded = Feature::load(&f.manifest_path()).unwrap();
        assert_eq!(reloaded.phase, Phase::Description);
    }

    #[test]
    fn with_lock_releases_on_error() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("guarded", None, None).unwrap();
        lc.unlock_feature(&f).unwrap();

        let result: Result<()> = lc.with_lock(&mut f, |lc, f| {
            lc.transition_feature(f, Phase::Complete)
        });
        assert!(result.is_err());
        assert!(lc.locks().read(&f).unwrap().is_none());

        lc.with_lock(&mut f, |lc, f| lc.transition_feature(f, Phase::Planning))
            .unwrap();
        assert!(lc.locks().read(&f).unwrap().is_none());
        assert_eq!(f.phase, Phase::Planning);
    }

    #[test]
    fn with_lock_keeps_an_existing_hold() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("held", None, None).unwrap();
        assert!(lc.locks().is_held_by_self(&f));

        lc.with_lock(&mut f, |lc, f| lc.transition_feature(f, Phase::Planning))
            .unwrap();
        assert!(lc.locks().is_held_by_self(&f));
    }

    #[test]
    fn failed_save_leaves_transition_retryable() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("unwritable", None, None).unwrap();
        let before = f.last_updated;

        std::fs::remove_file(f.manifest_path()).unwrap();
        std::fs::create_dir(f.manifest_path()).unwrap();
        assert!(lc.transition_feature(&mut f, Phase::Planning).is_err());
        assert_eq!(f.phase, Phase::Description);
        assert_eq!(f.last_updated, before);

        std::fs::remove_dir(f.manifest_path()).unwrap();
        lc.transition_feature(&mut f, Phase::Planning).unwrap();
        assert_eq!(
            Feature::load(&f.manifest_path()).unwrap().phase,
            Phase::Planning
        );
    }

    #[cfg(unix)]
    #[test]
    fn list_all_survives_unreadable_sibling() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        lc.create_feature("healthy", None, None).unwrap();
        let sealed = dir.path().join("wip/sealed");
        std::fs::create_dir(&sealed).unwrap();
        std::fs::set_permissions(&sealed, std::fs::Permissions::from_mode(0o000)).unwrap();

        let listed = lc.list_all();
        std::fs::set_permissions(&sealed, std::fs::Permissions::from_mode(0o755)).unwrap();

        let names: Vec<_> = listed.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["healthy".to_string()]);
    }

    #[test]
    fn save_feature_persists_accumulators() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("accum", None, None).unwrap();
        f.add_code_paths(["app/Http/Controllers/CheckoutController.php"]);
        f.add_test_paths(["tests/Feature/CheckoutTest.php"]);
        lc.save_feature(&f).unwrap();

        let reloaded = lc.find_feature("accum").unwrap();
        assert_eq!(reloaded.code_paths, f.code_paths);
        assert_eq!(reloaded.test_paths, f.test_paths);
    }

    #[test]
    fn archive_then_list_archived() {
        let dir = TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let mut f = lc.create_feature("retired", None, None).unwrap();
        lc.archive_feature(&mut f).unwrap();

        assert_eq!(lc.root_of(&f), Some(Root::Archive));
        assert!(lc.find_feature("retired").is_none());
        assert!(!f.lock_path().exists());
        let archived = lc.list_archived().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].name, "retired");
    }
}

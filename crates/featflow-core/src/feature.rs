use crate::paths;
use crate::phase::Phase;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ImprovementNote
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementNote {
    pub goal: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// Full in-memory state of one feature. `path` is the directory currently
/// holding the feature's files and changes when the feature moves roots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub name: String,
    pub phase: Phase,
    pub path: PathBuf,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub parent_feature: Option<String>,
    pub parent_relationship: Option<String>,
    pub test_paths: Vec<String>,
    pub code_paths: Vec<String>,
    pub artifacts: BTreeMap<String, Vec<String>>,
    pub improvement_history: Vec<ImprovementNote>,
    /// Frontmatter keys featflow does not interpret, carried through saves.
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub extra_metadata: Mapping,
}

impl Feature {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            phase: Phase::Description,
            path: path.into(),
            content: String::new(),
            created_at: now,
            last_updated: now,
            parent_feature: None,
            parent_relationship: None,
            test_paths: Vec::new(),
            code_paths: Vec::new(),
            artifacts: BTreeMap::new(),
            improvement_history: Vec::new(),
            extra_metadata: Mapping::new(),
        }
    }

    /// Advance `last_updated`. The new value is strictly greater than the
    /// previous one even if the wall clock stepped backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_updated = if now > self.last_updated {
            now
        } else {
            self.last_updated + Duration::microseconds(1)
        };
    }

    // ---------------------------------------------------------------------------
    // Paths
    // ---------------------------------------------------------------------------

    pub fn manifest_path(&self) -> PathBuf {
        paths::manifest_path(&self.path, &self.name)
    }

    pub fn lock_path(&self) -> PathBuf {
        paths::lock_path(&self.path)
    }

    pub fn planning_dir(&self) -> PathBuf {
        self.path.join(paths::PLANNING_DIR)
    }

    pub fn research_dir(&self) -> PathBuf {
        self.path.join(paths::RESEARCH_DIR)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.path.join(paths::ASSETS_DIR)
    }

    pub fn dir(&self) -> &Path {
        &self.path
    }

    // ---------------------------------------------------------------------------
    // Accumulators
    // ---------------------------------------------------------------------------

    pub fn add_code_paths<I, S>(&mut self, code_paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.code_paths.extend(code_paths.into_iter().map(Into::into));
        self.touch();
    }

    pub fn add_test_paths<I, S>(&mut self, test_paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_paths.extend(test_paths.into_iter().map(Into::into));
        self.touch();
    }

    pub fn add_artifact(&mut self, bucket: impl Into<String>, path: impl Into<String>) {
        self.artifacts
            .entry(bucket.into())
            .or_default()
            .push(path.into());
        self.touch();
    }

    pub fn set_parent(&mut self, parent_feature: impl Into<String>, relationship: Option<String>) {
        self.parent_feature = Some(parent_feature.into());
        self.parent_relationship = relationship;
        self.touch();
    }

    // ---------------------------------------------------------------------------
    // Improvement history
    // ---------------------------------------------------------------------------

    /// The open improvement record, if any.
    pub fn current_improvement(&self) -> Option<&ImprovementNote> {
        self.improvement_history.iter().rev().find(|n| !n.completed)
    }

    pub fn add_improvement_note(&mut self, goal: impl Into<String>) {
        self.improvement_history.push(ImprovementNote {
            goal: goal.into(),
            date: Utc::now().date_naive(),
            completed: false,
        });
        self.touch();
    }

    /// Close the most recent open improvement record. Returns false when
    /// there was nothing open.
    pub fn mark_current_improvement_complete(&mut self) -> bool {
        let Some(note) = self
            .improvement_history
            .iter_mut()
            .rev()
            .find(|n| !n.completed)
        else {
            return false;
        };
        note.completed = true;
        self.touch();
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

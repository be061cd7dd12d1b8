use crate::error::{FlowError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FEATFLOW_DIR: &str = ".featflow";
pub const CONFIG_FILE: &str = ".featflow/config.yaml";

pub const DEFAULT_WIP_ROOT: &str = "features/wip";
pub const DEFAULT_COMPLETED_ROOT: &str = "features/completed";
pub const DEFAULT_ARCHIVE_ROOT: &str = "features/archive";

pub const PLANNING_DIR: &str = "planning";
pub const RESEARCH_DIR: &str = "research";
pub const ASSETS_DIR: &str = "assets";
pub const SUBDIRECTORIES: [&str; 3] = [PLANNING_DIR, RESEARCH_DIR, ASSETS_DIR];

pub const LOCK_FILE: &str = ".lock";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `_<name>.md`
pub fn manifest_filename(name: &str) -> String {
    format!("_{name}.md")
}

pub fn manifest_path(feature_dir: &Path, name: &str) -> PathBuf {
    feature_dir.join(manifest_filename(name))
}

pub fn lock_path(feature_dir: &Path) -> PathBuf {
    feature_dir.join(LOCK_FILE)
}

pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE)
}

pub fn featflow_dir(project_root: &Path) -> PathBuf {
    project_root.join(FEATFLOW_DIR)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("static regex"))
}

pub fn validate_name(name: &str) -> Result<()> {
    if !name_re().is_match(name) {
        return Err(FlowError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["valid-name-123", "a", "checkout-flow", "x1"] {
            validate_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["Invalid_Name", "invalid name", "", "UPPER", "a/b", "a.md"] {
            assert!(
                matches!(validate_name(name), Err(FlowError::InvalidName(_))),
                "expected invalid: {name}"
            );
        }
    }

    #[test]
    fn path_helpers() {
        let dir = Path::new("/tmp/proj/features/wip/checkout-flow");
        assert_eq!(
            manifest_path(dir, "checkout-flow"),
            PathBuf::from("/tmp/proj/features/wip/checkout-flow/_checkout-flow.md")
        );
        assert_eq!(
            lock_path(dir),
            PathBuf::from("/tmp/proj/features/wip/checkout-flow/.lock")
        );
        assert_eq!(
            config_path(Path::new("/tmp/proj")),
            PathBuf::from("/tmp/proj/.featflow/config.yaml")
        );
    }
}

use crate::error::{FlowError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RootsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootsConfig {
    #[serde(default = "default_wip")]
    pub wip: PathBuf,
    #[serde(default = "default_completed")]
    pub completed: PathBuf,
    #[serde(default = "default_archive")]
    pub archive: PathBuf,
}

fn default_wip() -> PathBuf {
    PathBuf::from(paths::DEFAULT_WIP_ROOT)
}

fn default_completed() -> PathBuf {
    PathBuf::from(paths::DEFAULT_COMPLETED_ROOT)
}

fn default_archive() -> PathBuf {
    PathBuf::from(paths::DEFAULT_ARCHIVE_ROOT)
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            wip: default_wip(),
            completed: default_completed(),
            archive: default_archive(),
        }
    }
}

// ---------------------------------------------------------------------------
// LockConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u32,
}

fn default_timeout_minutes() -> u32 {
    60
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.timeout_minutes))
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub roots: RootsConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            version: 1,
            roots: RootsConfig::default(),
            lock: LockConfig::default(),
        }
    }

    pub fn load(project_root: &Path) -> Result<Self> {
        let path = paths::config_path(project_root);
        if !path.exists() {
            return Err(FlowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, project_root: &Path) -> Result<()> {
        let path = paths::config_path(project_root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let roots = [
            ("wip", &self.roots.wip),
            ("completed", &self.roots.completed),
            ("archive", &self.roots.archive),
        ];

        for (i, (a_name, a)) in roots.iter().enumerate() {
            for (b_name, b) in roots.iter().skip(i + 1) {
                if a == b {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("roots '{a_name}' and '{b_name}' are the same directory"),
                    });
                } else if b.starts_with(a) || a.starts_with(b) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("roots '{a_name}' and '{b_name}' are nested"),
                    });
                }
            }
        }

        if self.lock.timeout_minutes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "lock.timeout_minutes is 0: every lock is immediately stale".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use crate::phase::Phase;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("not initialized: run 'featflow init'")]
    NotInitialized,

    #[error("feature root missing: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("invalid feature name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidName(String),

    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("feature not found: {0}")]
    NotFound(String),

    #[error("corrupted feature file {}: {reason}", path.display())]
    CorruptedState { path: PathBuf, reason: String },

    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: Phase, to: Phase },

    #[error("feature '{feature}' is locked by {locked_by}")]
    FeatureLocked { feature: String, locked_by: String },

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("source directory missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("malformed frontmatter: {0}")]
    MalformedFrontmatter(String),

    #[error("invalid metadata syntax: {0}")]
    InvalidMetadataSyntax(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FlowError::CorruptedState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

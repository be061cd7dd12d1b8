pub mod config;
pub mod error;
pub mod feature;
pub mod frontmatter;
pub mod io;
pub mod layout;
pub mod lifecycle;
pub mod lock;
pub mod paths;
pub mod phase;
pub mod store;

pub use error::{FlowError, Result};
pub use feature::{Feature, ImprovementNote};
pub use layout::{Layout, PlanningDocument, Root};
pub use lifecycle::Lifecycle;
pub use lock::{LockInfo, LockManager};
pub use phase::Phase;

pub mod memory;
pub mod session_store;
pub mod types;

pub use memory::{ContextMemory, MemoryEntry, NO_REPORTS_SENTINEL};
pub use session_store::{RUN_GAP_SECS, SessionStore};
pub use types::{Article, CleanupReport, MonitoringSession, NewArticle, Report};

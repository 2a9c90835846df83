use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ongoing monitoring task: topic, cadence, recipient, active state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSession {
    pub id: i64,
    pub prompt: String,
    pub interval_hours: u32,
    pub started_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub recipient: String,
}

/// A structured record extracted from raw search output, before persistence
/// assigns its discovery timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub snippet: String,
}

/// A stored article, stamped with the time the monitoring run found it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub session_id: i64,
    pub title: String,
    pub url: String,
    pub source: String,
    pub snippet: String,
    pub found_at: DateTime<Utc>,
}

/// One LLM-generated analysis produced by a monitoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub session_id: i64,
    pub analysis: String,
    pub created_at: DateTime<Utc>,
    pub article_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub articles_deleted: usize,
    pub reports_deleted: usize,
}

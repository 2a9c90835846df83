use std::sync::Arc;

use chrono::{DateTime, Utc};
use newswatch_common::{Error, Result};
use newswatch_store::{Article, MonitoringSession, NO_REPORTS_SENTINEL, SessionStore};
use tracing::{info, warn};

use crate::prompts;
use crate::providers::LlmProvider;

const AGGREGATE_ERROR_TEXT: &str = "Error generating aggregate summary.";

/// Cross-session merge of stored articles and reports with one synthesized
/// overview.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    /// Per-run article groups, concatenated across the aggregated sessions.
    pub article_groups: Vec<Vec<Article>>,
    pub reports: Vec<String>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub synthesis: String,
}

impl AggregateOutcome {
    pub fn article_count(&self) -> usize {
        self.article_groups.iter().map(Vec::len).sum()
    }
}

pub struct Aggregator {
    store: Arc<SessionStore>,
    llm: Arc<dyn LlmProvider>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl Aggregator {
    pub fn new(store: Arc<SessionStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            store,
            llm,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Merge article groups and reports across the given sessions and
    /// synthesize one overview. The covered period runs from the earliest
    /// session start to now. Store failures propagate; an LLM failure
    /// degrades to a literal error summary.
    pub async fn aggregate(&self, sessions: &[MonitoringSession]) -> Result<AggregateOutcome> {
        if sessions.is_empty() {
            return Err(Error::NotFound("no sessions to aggregate".into()));
        }

        let mut article_groups = Vec::new();
        let mut reports = Vec::new();

        for session in sessions {
            article_groups.extend(self.store.get_session_articles(session.id, None)?);
            reports.extend(self.store.get_session_reports(session.id)?);
        }

        let period_start = sessions
            .iter()
            .map(|s| s.started_at)
            .min()
            .unwrap_or_else(Utc::now);
        let period_end = Utc::now();

        let synthesis = if reports.is_empty() {
            NO_REPORTS_SENTINEL.to_string()
        } else {
            let mut request = prompts::aggregate_request(&reports);
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;

            match self.llm.complete(&request).await {
                Ok(response) => response.content,
                Err(e) => {
                    warn!("aggregate synthesis failed: {e}");
                    AGGREGATE_ERROR_TEXT.to_string()
                }
            }
        };

        info!(
            "aggregated {} sessions: {} article groups, {} reports",
            sessions.len(),
            article_groups.len(),
            reports.len()
        );

        Ok(AggregateOutcome {
            article_groups,
            reports,
            period_start,
            period_end,
            synthesis,
        })
    }
}

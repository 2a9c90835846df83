//! One full monitoring pass against a real (in-memory) store: pipeline
//! output is persisted the way the scheduled cycle persists it.

use std::sync::Arc;

use async_trait::async_trait;
use newswatch_agents::pipeline::ResearchPipeline;
use newswatch_agents::providers::{LlmProvider, LlmRequest, LlmResponse};
use newswatch_agents::search::SearchProvider;
use newswatch_common::Result;
use newswatch_store::{ContextMemory, SessionStore};

struct CannedLlm;

#[async_trait]
impl LlmProvider for CannedLlm {
    fn provider_id(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        // First call refines the query, second writes the analysis.
        let content = if request.messages[0].content.contains("Generate a search query") {
            "quarterly earnings latest results"
        } else {
            "Earnings rose sharply according to the report."
        };
        Ok(LlmResponse {
            content: content.to_string(),
            model: "canned".into(),
            usage: None,
            stop_reason: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

struct CannedSearch;

#[async_trait]
impl SearchProvider for CannedSearch {
    fn provider_id(&self) -> &str {
        "canned"
    }

    async fn search(&self, _query: &str) -> Result<String> {
        Ok("Example Corp posts record earnings http://example.com/x\n\
            The quarterly report exceeded analyst expectations.\n\
            Revenue grew twenty percent year over year.\n"
            .to_string())
    }
}

#[tokio::test]
async fn one_pass_persists_articles_and_report() {
    let store = SessionStore::in_memory().expect("in-memory store");
    let session_id = store
        .create_session("quarterly earnings", 6, "a@b.com")
        .expect("create session");

    let dir = tempfile::tempdir().expect("tempdir");
    let memory = Arc::new(ContextMemory::load(dir.path().join("memory.json")));

    let pipeline = ResearchPipeline::new(Arc::new(CannedLlm), Arc::new(CannedSearch), memory);
    let outcome = pipeline.run("quarterly earnings").await.expect("run");

    assert_eq!(outcome.articles.len(), 1);
    assert_eq!(outcome.articles[0].url, "http://example.com/x");
    assert_eq!(outcome.articles[0].title, "Example Corp posts record earnings");

    // Persist the pass the way the scheduled cycle does.
    store
        .store_articles(session_id, &outcome.articles)
        .expect("store articles");
    store
        .store_report(session_id, &outcome.analysis, outcome.articles.len())
        .expect("store report");
    store.update_session_run(session_id).expect("stamp run");

    let groups = store
        .get_session_articles(session_id, None)
        .expect("load articles");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 1);
    assert_eq!(groups[0][0].url, "http://example.com/x");

    let reports = store.get_reports(session_id).expect("load reports");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].article_count, 1);
    assert_eq!(
        reports[0].analysis,
        "Earnings rose sharply according to the report."
    );

    let session = store
        .get_session(session_id)
        .expect("load session")
        .expect("session exists");
    assert!(session.last_run_at.is_some());
}

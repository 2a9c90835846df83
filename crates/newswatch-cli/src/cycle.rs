use std::sync::Arc;

use async_trait::async_trait;
use newswatch_agents::ResearchPipeline;
use newswatch_common::Result;
use newswatch_report::{EmailGateway, ReportKind, render_html, render_text, subject_for};
use newswatch_scheduler::{CycleRunner, MonitorJob};
use newswatch_store::SessionStore;
use tracing::{error, info};

/// One scheduled monitoring cycle: run the research pipeline, persist its
/// output, and email the rendered report.
///
/// Persistence failures propagate and mark the cycle failed; a delivery
/// failure is logged but does not fail the cycle, since the run's data is
/// already stored.
pub struct MonitoringCycle {
    store: Arc<SessionStore>,
    pipeline: Arc<ResearchPipeline>,
    mailer: Arc<dyn EmailGateway>,
}

impl MonitoringCycle {
    pub fn new(
        store: Arc<SessionStore>,
        pipeline: Arc<ResearchPipeline>,
        mailer: Arc<dyn EmailGateway>,
    ) -> Self {
        Self {
            store,
            pipeline,
            mailer,
        }
    }
}

#[async_trait]
impl CycleRunner for MonitoringCycle {
    async fn run_cycle(&self, job: &MonitorJob) -> Result<()> {
        info!("running monitoring cycle for session {}", job.session_id);

        let outcome = self.pipeline.run(&job.prompt).await?;

        self.store.store_articles(job.session_id, &outcome.articles)?;
        self.store
            .store_report(job.session_id, &outcome.analysis, outcome.articles.len())?;
        self.store.update_session_run(job.session_id)?;

        let html = render_html(
            &outcome.articles,
            &outcome.analysis,
            &job.prompt,
            ReportKind::Scheduled,
        );
        let text = render_text(
            &outcome.articles,
            &outcome.analysis,
            &job.prompt,
            ReportKind::Scheduled,
        );
        let subject = subject_for(ReportKind::Scheduled, &job.prompt);

        if let Err(e) = self
            .mailer
            .send(&job.recipient, &subject, &html, Some(&text))
            .await
        {
            error!(
                "report delivery failed for session {}: {e}",
                job.session_id
            );
        }

        info!("monitoring cycle completed for session {}", job.session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newswatch_agents::providers::{LlmProvider, LlmRequest, LlmResponse};
    use newswatch_agents::search::SearchProvider;
    use newswatch_common::Error;
    use newswatch_store::ContextMemory;
    use std::sync::Mutex;

    struct StubLlm;

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_id(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse> {
            Ok(LlmResponse {
                content: "stub output".to_string(),
                model: "stub".to_string(),
                usage: None,
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct StubSearch;

    #[async_trait]
    impl SearchProvider for StubSearch {
        fn provider_id(&self) -> &str {
            "stub"
        }

        async fn search(&self, _query: &str) -> Result<String> {
            Ok("Headline https://example.com/story\nSnippet line.".to_string())
        }
    }

    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn new(fail: bool) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl EmailGateway for RecordingMailer {
        async fn send(
            &self,
            recipient: &str,
            subject: &str,
            _html_body: &str,
            _text_body: Option<&str>,
        ) -> Result<()> {
            if self.fail {
                return Err(Error::Delivery("relay refused".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn cycle_under_test(mailer: Arc<RecordingMailer>) -> (MonitoringCycle, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(ContextMemory::load(dir.keep().join("memory.json")));
        let pipeline = Arc::new(ResearchPipeline::new(
            Arc::new(StubLlm),
            Arc::new(StubSearch),
            memory,
        ));
        (
            MonitoringCycle::new(store.clone(), pipeline, mailer),
            store,
        )
    }

    fn job(session_id: i64) -> MonitorJob {
        MonitorJob {
            session_id,
            prompt: "rust releases".to_string(),
            recipient: "a@b.com".to_string(),
        }
    }

    #[tokio::test]
    async fn cycle_persists_and_mails() {
        let mailer = Arc::new(RecordingMailer::new(false));
        let (cycle, store) = cycle_under_test(mailer.clone());
        let session_id = store.create_session("rust releases", 6, "a@b.com").unwrap();

        cycle.run_cycle(&job(session_id)).await.unwrap();

        let groups = store.get_session_articles(session_id, None).unwrap();
        assert_eq!(groups.len(), 1);
        let reports = store.get_reports(session_id).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].article_count, groups[0].len() as i64);
        assert!(store.get_session(session_id).unwrap().unwrap().last_run_at.is_some());

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@b.com");
        assert_eq!(sent[0].1, "Scheduled News Update: rust releases");
    }

    #[tokio::test]
    async fn delivery_failure_does_not_fail_the_cycle() {
        let mailer = Arc::new(RecordingMailer::new(true));
        let (cycle, store) = cycle_under_test(mailer);
        let session_id = store.create_session("rust releases", 6, "a@b.com").unwrap();

        cycle.run_cycle(&job(session_id)).await.unwrap();

        // The run's data is still persisted.
        assert_eq!(store.get_reports(session_id).unwrap().len(), 1);
    }
}

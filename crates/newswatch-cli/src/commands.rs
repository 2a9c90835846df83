use std::sync::Arc;

use anyhow::{Context, bail};
use newswatch_agents::{
    Aggregator, ResearchPipeline, build_provider, build_search_provider,
};
use newswatch_config::{AppConfig, ConfigLoader};
use newswatch_report::{
    EmailGateway, ReportKind, SmtpMailer, aggregate_subject, render_aggregate_html, render_html,
    render_text, subject_for,
};
use newswatch_scheduler::{MonitorJob, MonitorScheduler};
use newswatch_store::{ContextMemory, MonitoringSession, SessionStore};
use tracing::info;

use crate::cycle::MonitoringCycle;

/// Generate and send a one-off report for a topic.
pub async fn instant(
    config: &AppConfig,
    loader: &ConfigLoader,
    prompt: &str,
    email: &str,
) -> anyhow::Result<()> {
    ensure_required(config)?;

    let memory = Arc::new(ContextMemory::load(loader.memory_path(config)));
    let pipeline = build_pipeline(config, memory)?;

    println!("Searching for: {prompt}");
    let outcome = pipeline.run(prompt).await?;
    println!("Found {} articles (query: {})", outcome.articles.len(), outcome.query);

    let html = render_html(&outcome.articles, &outcome.analysis, prompt, ReportKind::Instant);
    let text = render_text(&outcome.articles, &outcome.analysis, prompt, ReportKind::Instant);

    let mailer = SmtpMailer::from_config(&config.email)?;
    mailer
        .send(
            email,
            &subject_for(ReportKind::Instant, prompt),
            &html,
            Some(&text),
        )
        .await
        .context("failed to send report")?;

    println!("Report sent to {email}");
    Ok(())
}

/// Create a monitoring session and run it on a schedule until interrupted.
pub async fn schedule(
    config: &AppConfig,
    loader: &ConfigLoader,
    prompt: &str,
    email: &str,
    interval_hours: Option<u32>,
) -> anyhow::Result<()> {
    ensure_required(config)?;

    let interval_hours = interval_hours.unwrap_or(config.scheduler.default_interval_hours);
    if interval_hours == 0 {
        bail!("interval must be at least one hour");
    }

    let store = Arc::new(SessionStore::open(&loader.database_path(config))?);
    let session_id = store.create_session(prompt, interval_hours, email)?;

    println!("Created monitoring session #{session_id}");
    println!("  Prompt:   {prompt}");
    println!("  Interval: every {interval_hours}h");
    println!("  Email:    {email}");

    let memory = Arc::new(ContextMemory::load(loader.memory_path(config)));
    let pipeline = build_pipeline(config, memory)?;
    let mailer: Arc<dyn EmailGateway> = Arc::new(SmtpMailer::from_config(&config.email)?);

    let runner = Arc::new(MonitoringCycle::new(store.clone(), pipeline, mailer));
    // The scheduler handle stays owned here so the shutdown path below can
    // reach it without any global state.
    let scheduler = MonitorScheduler::new(runner);
    scheduler.schedule_monitoring(
        session_id,
        interval_hours,
        MonitorJob {
            session_id,
            prompt: prompt.to_string(),
            recipient: email.to_string(),
        },
    );
    scheduler.start();

    println!("Monitoring started. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    println!("Stopping monitoring...");
    store.stop_session(session_id)?;
    scheduler.stop();
    info!("monitoring session {session_id} stopped");
    println!("Monitoring stopped.");
    Ok(())
}

/// Synthesize one overview across a session's (or all active sessions')
/// history and email it.
pub async fn aggregate(
    config: &AppConfig,
    loader: &ConfigLoader,
    session_id: Option<i64>,
    all_sessions: bool,
    email: &str,
) -> anyhow::Result<()> {
    ensure_required(config)?;

    if session_id.is_none() && !all_sessions {
        bail!("specify either --session-id or --all");
    }

    let store = Arc::new(SessionStore::open(&loader.database_path(config))?);

    let sessions: Vec<MonitoringSession> = match session_id {
        Some(id) => match store.get_session(id)? {
            Some(session) => vec![session],
            None => bail!("session {id} not found"),
        },
        None => store.get_active_sessions()?,
    };

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    let prompt = sessions[0].prompt.clone();
    let llm = Arc::from(build_provider(&config.llm)?);
    let aggregator = Aggregator::new(store, llm)
        .with_sampling(config.llm.temperature, config.llm.max_tokens);

    println!("Aggregating {} session(s)...", sessions.len());
    let outcome = aggregator.aggregate(&sessions).await?;
    println!(
        "Covering {} article(s) across {} run(s), {} report(s)",
        outcome.article_count(),
        outcome.article_groups.len(),
        outcome.reports.len()
    );

    let html = render_aggregate_html(
        &outcome.article_groups,
        &outcome.synthesis,
        &prompt,
        outcome.period_start,
        outcome.period_end,
    );

    let mailer = SmtpMailer::from_config(&config.email)?;
    mailer
        .send(email, &aggregate_subject(&prompt), &html, None)
        .await
        .context("failed to send aggregate report")?;

    println!("Aggregate report sent to {email}");
    Ok(())
}

/// Print the active monitoring sessions.
pub fn status(config: &AppConfig, loader: &ConfigLoader) -> anyhow::Result<()> {
    let store = SessionStore::open(&loader.database_path(config))?;
    let sessions = store.get_active_sessions()?;

    if sessions.is_empty() {
        println!("No active monitoring sessions.");
        return Ok(());
    }

    println!("Active monitoring sessions:");
    for session in sessions {
        println!("Session #{}", session.id);
        println!("  Prompt:   {}", session.prompt);
        println!("  Interval: every {}h", session.interval_hours);
        println!("  Started:  {}", session.started_at.format("%Y-%m-%d %H:%M UTC"));
        match session.last_run_at {
            Some(at) => println!("  Last run: {}", at.format("%Y-%m-%d %H:%M UTC")),
            None => println!("  Last run: not yet run"),
        }
        println!("  Email:    {}", session.recipient);
    }
    Ok(())
}

/// Drop stored articles and reports past the retention window.
pub fn cleanup(
    config: &AppConfig,
    loader: &ConfigLoader,
    days: Option<u32>,
) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.scheduler.max_history_days);
    let store = SessionStore::open(&loader.database_path(config))?;
    let report = store.cleanup_old_data(days)?;
    println!(
        "Removed {} article(s) and {} report(s) older than {days} days.",
        report.articles_deleted, report.reports_deleted
    );
    Ok(())
}

fn build_pipeline(
    config: &AppConfig,
    memory: Arc<ContextMemory>,
) -> anyhow::Result<Arc<ResearchPipeline>> {
    let llm = Arc::from(build_provider(&config.llm)?);
    let search = Arc::from(build_search_provider(&config.search)?);
    Ok(Arc::new(
        ResearchPipeline::new(llm, search, memory)
            .with_sampling(config.llm.temperature, config.llm.max_tokens)
            .with_content_extraction(true),
    ))
}

fn ensure_required(config: &AppConfig) -> anyhow::Result<()> {
    let missing = config.missing_required();
    if missing.is_empty() {
        return Ok(());
    }
    bail!(
        "missing required configuration: {} (set them in config.yml or via NEWSWATCH_* environment variables)",
        missing.join(", ")
    );
}

//! Recurring monitoring jobs, one per active session.
//!
//! Each job ticks at a fixed cadence and spawns its execution as a separate
//! task: a slow cycle never delays the next tick, which means back-to-back
//! executions for the same session can overlap. Stopping the scheduler
//! cancels future ticks but lets in-flight executions run to completion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newswatch_common::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const SECONDS_PER_HOUR: u64 = 3600;

/// Typed descriptor of one recurring monitoring job: exactly the parameters
/// a cycle needs, no open-ended argument bag.
#[derive(Debug, Clone)]
pub struct MonitorJob {
    pub session_id: i64,
    pub prompt: String,
    pub recipient: String,
}

/// One monitoring cycle. Errors are logged at the trigger site and never
/// cancel the schedule.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, job: &MonitorJob) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JobStatus {
    pub job_id: String,
    pub session_id: i64,
    pub period: Duration,
    pub next_run_at: Option<DateTime<Utc>>,
    pub runs_started: u64,
}

struct JobState {
    next_run_at: Option<DateTime<Utc>>,
    runs_started: u64,
}

struct ScheduledJob {
    session_id: i64,
    period: Duration,
    job: MonitorJob,
    cancel: CancellationToken,
    state: Arc<Mutex<JobState>>,
    ticking: bool,
}

/// Owns the recurring triggers. Job identity derives from the session id, so
/// scheduling a session that already has a job replaces the prior job.
/// Jobs registered before [`MonitorScheduler::start`] stay dormant until it
/// is called; each job's first execution fires immediately once ticking.
pub struct MonitorScheduler {
    runner: Arc<dyn CycleRunner>,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl MonitorScheduler {
    pub fn new(runner: Arc<dyn CycleRunner>) -> Self {
        Self {
            runner,
            jobs: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn job_id_for(session_id: i64) -> String {
        format!("monitor-{session_id}")
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Begin triggering. Jobs scheduled earlier start ticking now, each with
    /// an immediate first execution.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut jobs = lock(&self.jobs);
        for (job_id, scheduled) in jobs.iter_mut() {
            if !scheduled.ticking {
                self.spawn_ticker(job_id, scheduled);
                scheduled.ticking = true;
            }
        }
        info!("scheduler started ({} jobs)", jobs.len());
    }

    /// Schedule a session at an hourly cadence.
    pub fn schedule_monitoring(
        &self,
        session_id: i64,
        interval_hours: u32,
        job: MonitorJob,
    ) -> String {
        self.schedule_with_period(
            session_id,
            Duration::from_secs(u64::from(interval_hours.max(1)) * SECONDS_PER_HOUR),
            job,
        )
    }

    /// Schedule with an explicit period, replacing any prior job for the
    /// same session.
    pub fn schedule_with_period(
        &self,
        session_id: i64,
        period: Duration,
        job: MonitorJob,
    ) -> String {
        let job_id = Self::job_id_for(session_id);
        let mut scheduled = ScheduledJob {
            session_id,
            period,
            job,
            cancel: self.shutdown.child_token(),
            state: Arc::new(Mutex::new(JobState {
                next_run_at: None,
                runs_started: 0,
            })),
            ticking: false,
        };

        let mut jobs = lock(&self.jobs);
        if let Some(previous) = jobs.remove(&job_id) {
            previous.cancel.cancel();
            info!("replacing scheduled job {job_id}");
        }

        if self.started.load(Ordering::SeqCst) {
            self.spawn_ticker(&job_id, &scheduled);
            scheduled.ticking = true;
        }
        jobs.insert(job_id.clone(), scheduled);

        info!(
            "scheduled job {job_id} every {}s with an immediate first run",
            period.as_secs()
        );
        job_id
    }

    fn spawn_ticker(&self, job_id: &str, scheduled: &ScheduledJob) {
        let runner = self.runner.clone();
        let job = scheduled.job.clone();
        let cancel = scheduled.cancel.clone();
        let state = scheduled.state.clone();
        let period = scheduled.period;
        let ticker_id = job_id.to_string();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        {
                            let mut state = lock(&state);
                            state.runs_started += 1;
                            state.next_run_at = Some(
                                Utc::now()
                                    + chrono::Duration::seconds(period.as_secs() as i64),
                            );
                        }

                        // Executions run detached so an overrun never shifts
                        // the cadence and a stop never kills a cycle midway.
                        let runner = runner.clone();
                        let job = job.clone();
                        tokio::spawn(async move {
                            if let Err(e) = runner.run_cycle(&job).await {
                                error!(
                                    "monitoring cycle failed for session {}: {e}",
                                    job.session_id
                                );
                            }
                        });
                    }
                    () = cancel.cancelled() => {
                        info!("schedule {ticker_id} stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Cancel a job's future triggers. Returns whether the job existed.
    pub fn remove_job(&self, job_id: &str) -> bool {
        let mut jobs = lock(&self.jobs);
        match jobs.remove(job_id) {
            Some(job) => {
                job.cancel.cancel();
                info!("removed job {job_id}");
                true
            }
            None => false,
        }
    }

    pub fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        let jobs = lock(&self.jobs);
        jobs.get(job_id).map(|job| status_of(job_id, job))
    }

    pub fn list_jobs(&self) -> Vec<JobStatus> {
        let jobs = lock(&self.jobs);
        let mut statuses: Vec<JobStatus> = jobs
            .iter()
            .map(|(id, job)| status_of(id, job))
            .collect();
        statuses.sort_by_key(|s| s.session_id);
        statuses
    }

    /// Halt all future triggering and drop the job table. In-flight
    /// executions are not interrupted; a stopped scheduler stays stopped.
    pub fn stop(&self) {
        self.shutdown.cancel();
        let mut jobs = lock(&self.jobs);
        let count = jobs.len();
        jobs.clear();
        info!("scheduler stopped ({count} jobs cancelled)");
    }
}

/// Lock recovering from poisoning: a panicked cycle must not wedge the
/// scheduler's bookkeeping.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn status_of(job_id: &str, job: &ScheduledJob) -> JobStatus {
    let state = lock(&job.state);
    JobStatus {
        job_id: job_id.to_string(),
        session_id: job.session_id,
        period: job.period,
        next_run_at: state.next_run_at,
        runs_started: state.runs_started,
    }
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use newswatch_common::{Error, Result};
use rusqlite::{Connection, params};
use tracing::info;

use crate::types::{Article, CleanupReport, MonitoringSession, NewArticle, Report};

/// Articles further apart than this are treated as belonging to different
/// monitoring runs. Articles carry no run identifier, so the discovery-time
/// gap is the only signal for reconstructing run boundaries.
pub const RUN_GAP_SECS: i64 = 1800;

/// Persistent storage for monitoring sessions, discovered articles, and
/// generated reports.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("opening session store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Persistence(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Persistence(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Persistence(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS monitoring_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt TEXT NOT NULL,
                interval_hours INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                last_run_at TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                recipient TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                source TEXT NOT NULL,
                snippet TEXT NOT NULL,
                found_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_articles_session
                ON articles(session_id, found_at);

            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                analysis TEXT NOT NULL,
                created_at TEXT NOT NULL,
                article_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_reports_session
                ON reports(session_id, created_at);",
        )
        .map_err(|e| Error::Persistence(format!("migration failed: {e}")))?;

        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Persistence("session database lock poisoned".into()))
    }

    /// Create a new monitoring session, active, with `started_at = now`.
    /// Returns the assigned session id.
    pub fn create_session(
        &self,
        prompt: &str,
        interval_hours: u32,
        recipient: &str,
    ) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO monitoring_sessions (prompt, interval_hours, started_at, recipient)
             VALUES (?, ?, ?, ?)",
            params![
                prompt,
                interval_hours,
                Utc::now().to_rfc3339(),
                recipient
            ],
        )
        .map_err(|e| Error::Persistence(format!("failed to create session: {e}")))?;

        let session_id = conn.last_insert_rowid();
        info!("created monitoring session {session_id}");
        Ok(session_id)
    }

    /// Stamp the session's last run time. No-op when the session is absent.
    pub fn update_session_run(&self, session_id: i64) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "UPDATE monitoring_sessions SET last_run_at = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), session_id],
        )
        .map_err(|e| Error::Persistence(format!("failed to update session run: {e}")))?;
        Ok(())
    }

    /// Mark a session inactive. No-op when the session is absent.
    pub fn stop_session(&self, session_id: i64) -> Result<()> {
        let conn = self.connection()?;
        let changed = conn
            .execute(
                "UPDATE monitoring_sessions SET is_active = 0 WHERE id = ?",
                params![session_id],
            )
            .map_err(|e| Error::Persistence(format!("failed to stop session: {e}")))?;

        if changed > 0 {
            info!("stopped monitoring session {session_id}");
        }
        Ok(())
    }

    pub fn get_active_sessions(&self) -> Result<Vec<MonitoringSession>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, prompt, interval_hours, started_at, last_run_at, is_active, recipient
                 FROM monitoring_sessions
                 WHERE is_active = 1
                 ORDER BY id",
            )
            .map_err(|e| Error::Persistence(format!("failed to prepare session query: {e}")))?;

        let rows = stmt
            .query_map([], row_to_session)
            .map_err(|e| Error::Persistence(format!("failed to query sessions: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Persistence(format!("failed to collect session rows: {e}")))
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<MonitoringSession>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, prompt, interval_hours, started_at, last_run_at, is_active, recipient
                 FROM monitoring_sessions
                 WHERE id = ?",
            )
            .map_err(|e| Error::Persistence(format!("failed to prepare session query: {e}")))?;

        let mut rows = stmt
            .query_map(params![session_id], row_to_session)
            .map_err(|e| Error::Persistence(format!("failed to query session: {e}")))?;

        rows.next()
            .transpose()
            .map_err(|e| Error::Persistence(format!("failed to read session row: {e}")))
    }

    /// Append a batch of articles found by one monitoring run. The whole
    /// batch shares one discovery timestamp and commits in one transaction.
    pub fn store_articles(&self, session_id: i64, articles: &[NewArticle]) -> Result<()> {
        let found_at = Utc::now().to_rfc3339();
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Persistence(format!("failed to begin transaction: {e}")))?;

        for article in articles {
            tx.execute(
                "INSERT INTO articles (session_id, title, url, source, snippet, found_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    session_id,
                    article.title,
                    article.url,
                    article.source,
                    article.snippet,
                    found_at
                ],
            )
            .map_err(|e| Error::Persistence(format!("failed to insert article: {e}")))?;
        }

        tx.commit()
            .map_err(|e| Error::Persistence(format!("failed to commit article batch: {e}")))?;

        info!("stored {} articles for session {session_id}", articles.len());
        Ok(())
    }

    pub fn store_report(&self, session_id: i64, analysis: &str, article_count: usize) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO reports (session_id, analysis, created_at, article_count)
             VALUES (?, ?, ?, ?)",
            params![
                session_id,
                analysis,
                Utc::now().to_rfc3339(),
                article_count as i64
            ],
        )
        .map_err(|e| Error::Persistence(format!("failed to insert report: {e}")))?;

        info!("stored report for session {session_id}");
        Ok(())
    }

    /// All articles for a session ordered by discovery time, partitioned into
    /// per-run groups wherever consecutive discovery timestamps are more than
    /// [`RUN_GAP_SECS`] apart.
    pub fn get_session_articles(
        &self,
        session_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Vec<Article>>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, title, url, source, snippet, found_at
                 FROM articles
                 WHERE session_id = ?1
                   AND (?2 IS NULL OR datetime(found_at) >= datetime(?2))
                 ORDER BY datetime(found_at), id",
            )
            .map_err(|e| Error::Persistence(format!("failed to prepare article query: {e}")))?;

        let since_param = since.map(|t| t.to_rfc3339());
        let rows = stmt
            .query_map(params![session_id, since_param], row_to_article)
            .map_err(|e| Error::Persistence(format!("failed to query articles: {e}")))?;

        let articles = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Persistence(format!("failed to collect article rows: {e}")))?;

        Ok(group_by_run(articles))
    }

    /// Full report rows for a session, creation order ascending.
    pub fn get_reports(&self, session_id: i64) -> Result<Vec<Report>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, analysis, created_at, article_count
                 FROM reports
                 WHERE session_id = ?
                 ORDER BY datetime(created_at), id",
            )
            .map_err(|e| Error::Persistence(format!("failed to prepare report query: {e}")))?;

        let rows = stmt
            .query_map(params![session_id], row_to_report)
            .map_err(|e| Error::Persistence(format!("failed to query reports: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Persistence(format!("failed to collect report rows: {e}")))
    }

    /// Analysis texts for a session, creation order ascending.
    pub fn get_session_reports(&self, session_id: i64) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT analysis FROM reports
                 WHERE session_id = ?
                 ORDER BY datetime(created_at), id",
            )
            .map_err(|e| Error::Persistence(format!("failed to prepare report query: {e}")))?;

        let rows = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Persistence(format!("failed to query reports: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Persistence(format!("failed to collect report rows: {e}")))
    }

    /// Irreversibly delete articles and reports older than `days` days.
    /// Sessions are never deleted here.
    pub fn cleanup_old_data(&self, days: u32) -> Result<CleanupReport> {
        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
        let conn = self.connection()?;

        let articles_deleted = conn
            .execute(
                "DELETE FROM articles WHERE datetime(found_at) < datetime(?)",
                params![cutoff],
            )
            .map_err(|e| Error::Persistence(format!("failed to delete old articles: {e}")))?;

        let reports_deleted = conn
            .execute(
                "DELETE FROM reports WHERE datetime(created_at) < datetime(?)",
                params![cutoff],
            )
            .map_err(|e| Error::Persistence(format!("failed to delete old reports: {e}")))?;

        info!("cleaned up data older than {days} days ({articles_deleted} articles, {reports_deleted} reports)");
        Ok(CleanupReport {
            articles_deleted,
            reports_deleted,
        })
    }
}

/// Split discovery-time-ordered articles into run groups at gaps larger than
/// [`RUN_GAP_SECS`].
fn group_by_run(articles: Vec<Article>) -> Vec<Vec<Article>> {
    let mut grouped: Vec<Vec<Article>> = Vec::new();
    let mut current: Vec<Article> = Vec::new();
    let mut last_time: Option<DateTime<Utc>> = None;

    for article in articles {
        if let Some(last) = last_time
            && (article.found_at - last).num_seconds() > RUN_GAP_SECS
            && !current.is_empty()
        {
            grouped.push(std::mem::take(&mut current));
        }
        last_time = Some(article.found_at);
        current.push(article);
    }

    if !current.is_empty() {
        grouped.push(current);
    }

    grouped
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<MonitoringSession> {
    let started_at_str: String = row.get(3)?;
    let started_at = parse_timestamp(&started_at_str).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(e.to_string())))
    })?;

    let last_run_at_str: Option<String> = row.get(4)?;
    let last_run_at = last_run_at_str
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(e.to_string())))
        })?;

    Ok(MonitoringSession {
        id: row.get(0)?,
        prompt: row.get(1)?,
        interval_hours: row.get(2)?,
        started_at,
        last_run_at,
        active: row.get::<_, i64>(5)? != 0,
        recipient: row.get(6)?,
    })
}

fn row_to_article(row: &rusqlite::Row<'_>) -> rusqlite::Result<Article> {
    let found_at_str: String = row.get(6)?;
    let found_at = parse_timestamp(&found_at_str).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(e.to_string())))
    })?;

    Ok(Article {
        id: row.get(0)?,
        session_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        source: row.get(4)?,
        snippet: row.get(5)?,
        found_at,
    })
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let created_at_str: String = row.get(3)?;
    let created_at = parse_timestamp(&created_at_str).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(e.to_string())))
    })?;

    Ok(Report {
        id: row.get(0)?,
        session_id: row.get(1)?,
        analysis: row.get(2)?,
        created_at,
        article_count: row.get(4)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    Err(Error::Persistence(format!(
        "invalid timestamp format: {raw}"
    )))
}

#[cfg(test)]
mod tests {
    use super::{RUN_GAP_SECS, SessionStore};
    use crate::types::NewArticle;
    use chrono::{Duration, Utc};
    use rusqlite::params;

    fn article(title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            source: "Web".to_string(),
            snippet: format!("snippet for {title}"),
        }
    }

    /// Insert an article row with an explicit discovery timestamp.
    fn insert_article_at(store: &SessionStore, session_id: i64, title: &str, found_at: chrono::DateTime<Utc>) {
        let conn = store.connection().expect("lock should not be poisoned");
        conn.execute(
            "INSERT INTO articles (session_id, title, url, source, snippet, found_at)
             VALUES (?, ?, 'https://example.com', 'Web', 'snippet', ?)",
            params![session_id, title, found_at.to_rfc3339()],
        )
        .expect("insert should succeed");
    }

    #[test]
    fn create_and_get_session_round_trip() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store
            .create_session("quarterly earnings", 6, "a@b.com")
            .expect("create should succeed");

        let session = store
            .get_session(id)
            .expect("get should succeed")
            .expect("session should exist");

        assert_eq!(session.id, id);
        assert_eq!(session.prompt, "quarterly earnings");
        assert_eq!(session.interval_hours, 6);
        assert_eq!(session.recipient, "a@b.com");
        assert!(session.active);
        assert!(session.last_run_at.is_none());
    }

    #[test]
    fn get_session_absent_returns_none() {
        let store = SessionStore::in_memory().expect("in-memory store");
        assert!(store.get_session(42).expect("get should succeed").is_none());
    }

    #[test]
    fn update_session_run_stamps_last_run() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        store.update_session_run(id).expect("update should succeed");
        let session = store.get_session(id).unwrap().unwrap();
        assert!(session.last_run_at.is_some());
    }

    #[test]
    fn update_and_stop_are_noops_for_absent_sessions() {
        let store = SessionStore::in_memory().expect("in-memory store");
        store.update_session_run(999).expect("should be a no-op");
        store.stop_session(999).expect("should be a no-op");
    }

    #[test]
    fn stop_session_excludes_from_active_list() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let first = store.create_session("one", 1, "a@b.com").unwrap();
        let second = store.create_session("two", 2, "b@c.com").unwrap();

        store.stop_session(first).expect("stop should succeed");

        let active = store.get_active_sessions().expect("query should succeed");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second);

        let stopped = store.get_session(first).unwrap().unwrap();
        assert!(!stopped.active);
    }

    #[test]
    fn store_articles_commits_one_batch() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        store
            .store_articles(id, &[article("first"), article("second")])
            .expect("batch should commit");

        let groups = store.get_session_articles(id, None).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].title, "first");
        assert_eq!(groups[0][0].session_id, id);
    }

    #[test]
    fn articles_group_by_run_gap() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        let t = Utc::now() - Duration::hours(2);
        insert_article_at(&store, id, "a", t);
        insert_article_at(&store, id, "b", t + Duration::seconds(100));
        insert_article_at(&store, id, "c", t + Duration::seconds(3000));

        let groups = store.get_session_articles(id, None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[1][0].title, "c");
    }

    #[test]
    fn gap_exactly_at_threshold_stays_in_one_group() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        let t = Utc::now() - Duration::hours(2);
        insert_article_at(&store, id, "a", t);
        insert_article_at(&store, id, "b", t + Duration::seconds(RUN_GAP_SECS));

        let groups = store.get_session_articles(id, None).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn since_filters_older_articles() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        let t = Utc::now();
        insert_article_at(&store, id, "old", t - Duration::days(2));
        insert_article_at(&store, id, "new", t - Duration::minutes(5));

        let groups = store
            .get_session_articles(id, Some(t - Duration::days(1)))
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].title, "new");
    }

    #[test]
    fn reports_come_back_in_creation_order() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        store.store_report(id, "first analysis", 3).unwrap();
        store.store_report(id, "second analysis", 1).unwrap();

        let reports = store.get_session_reports(id).unwrap();
        assert_eq!(reports, vec!["first analysis", "second analysis"]);

        let rows = store.get_reports(id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].article_count, 3);
        assert_eq!(rows[1].article_count, 1);
        assert_eq!(rows[1].session_id, id);
    }

    #[test]
    fn cleanup_removes_only_expired_rows() {
        let store = SessionStore::in_memory().expect("in-memory store");
        let id = store.create_session("topic", 1, "a@b.com").unwrap();

        let now = Utc::now();
        insert_article_at(&store, id, "stale", now - Duration::days(31));
        insert_article_at(&store, id, "fresh", now - Duration::days(1));

        {
            let conn = store.connection().unwrap();
            conn.execute(
                "INSERT INTO reports (session_id, analysis, created_at, article_count)
                 VALUES (?, 'old report', ?, 0)",
                params![id, (now - Duration::days(31)).to_rfc3339()],
            )
            .unwrap();
        }
        store.store_report(id, "recent report", 1).unwrap();

        let report = store.cleanup_old_data(30).expect("cleanup should succeed");
        assert_eq!(report.articles_deleted, 1);
        assert_eq!(report.reports_deleted, 1);

        let groups = store.get_session_articles(id, None).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0][0].title, "fresh");

        let reports = store.get_session_reports(id).unwrap();
        assert_eq!(reports, vec!["recent report"]);

        // Sessions survive cleanup.
        assert!(store.get_session(id).unwrap().is_some());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("newswatch.db");
        let store = SessionStore::open(&path).expect("open should succeed");
        store.create_session("topic", 1, "a@b.com").unwrap();
        assert!(path.exists());
    }
}

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use newswatch_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const NO_REPORTS_SENTINEL: &str = "No previous reports found.";

const DEFAULT_MAX_ENTRIES: usize = 10;
const DEFAULT_CONTEXT_LIMIT: usize = 3;
const SUMMARY_CONTEXT_CHARS: usize = 500;

/// One remembered monitoring pass: when it ran, what it asked, what it found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub summary: String,
}

/// Rolling memory of past report summaries, persisted as a single JSON
/// document overwritten on every update.
///
/// The list is process-wide rather than per-session: every monitoring topic
/// reads and writes the same timeline. Newest entries sit at the head and
/// the tail is trimmed once the cap is exceeded.
pub struct ContextMemory {
    path: PathBuf,
    max_entries: usize,
    entries: Mutex<Vec<MemoryEntry>>,
}

impl ContextMemory {
    /// Load memory from `path`. A missing file starts empty; an unreadable
    /// or corrupt file is logged and treated as empty rather than failing
    /// startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_with_capacity(path, DEFAULT_MAX_ENTRIES)
    }

    pub fn load_with_capacity(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("failed to parse memory file {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("failed to read memory file {}: {e}", path.display());
                Vec::new()
            }
        };

        Self {
            path,
            max_entries: max_entries.max(1),
            entries: Mutex::new(entries),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, Vec<MemoryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Persistence("memory lock poisoned".into()))
    }

    /// Render the most recent entries as context for query refinement and
    /// analysis. `_prompt_hint` is accepted for future relevance filtering
    /// but unused: context is always the latest entries regardless of topic.
    pub fn get_context(&self, _prompt_hint: &str, limit: Option<usize>) -> Result<String> {
        let limit = limit.unwrap_or(DEFAULT_CONTEXT_LIMIT);
        let entries = self.entries()?;

        if entries.is_empty() {
            return Ok(NO_REPORTS_SENTINEL.to_string());
        }

        let parts: Vec<String> = entries
            .iter()
            .take(limit)
            .map(|entry| {
                let summary: String = entry.summary.chars().take(SUMMARY_CONTEXT_CHARS).collect();
                format!(
                    "--- Report from {} ---\nTopic: {}\nSummary: {summary}...",
                    entry.timestamp.to_rfc3339(),
                    entry.prompt
                )
            })
            .collect();

        Ok(parts.join("\n\n"))
    }

    /// Record a new report summary at the head, trim to capacity, and
    /// persist the whole list.
    pub fn add_report(&self, prompt: &str, summary: &str) -> Result<()> {
        self.add_report_at(prompt, summary, Utc::now())
    }

    pub fn add_report_at(
        &self,
        prompt: &str,
        summary: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.entries()?;
        entries.insert(
            0,
            MemoryEntry {
                timestamp,
                prompt: prompt.to_string(),
                summary: summary.to_string(),
            },
        );
        entries.truncate(self.max_entries);

        persist(&self.path, &entries)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }

    #[cfg(test)]
    fn newest(&self) -> Option<MemoryEntry> {
        self.entries().ok()?.first().cloned()
    }
}

fn persist(path: &Path, entries: &[MemoryEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)
        .map_err(|e| Error::Persistence(format!("failed to write memory file: {e}")))
}

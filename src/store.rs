use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Status of a processing attempt. Serialized as lowercase text in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Success,
    Error,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Error => "error",
        }
    }
}

/// One row of the append-only processing log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub post_id: u64,
    pub post_title: String,
    pub action: String,
    pub status: String,
    pub details: String,
    pub processing_time: f64,
    pub created_at: String,
}

/// Persisted credential rotation state (single row).
#[derive(Debug, Clone)]
pub struct RotationState {
    pub api_key_index: usize,
    pub requests_made: u64,
    pub quota_exceeded: bool,
    pub last_reset_date: Option<String>,
}

impl Default for RotationState {
    fn default() -> Self {
        Self {
            api_key_index: 0,
            requests_made: 0,
            quota_exceeded: false,
            last_reset_date: None,
        }
    }
}

/// SQLite-backed progress store: processing cursor, append-only log,
/// credential rotation state, and a generic statistics table. Single-writer
/// by construction (one orchestrator process).
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open progress store at {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS processing_control (
                    id INTEGER PRIMARY KEY,
                    last_processed_post_id INTEGER,
                    last_processed_date TEXT,
                    total_posts_processed INTEGER DEFAULT 0,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE IF NOT EXISTS processing_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id INTEGER,
                    post_title TEXT,
                    action TEXT,
                    status TEXT,
                    details TEXT,
                    processing_time REAL,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE IF NOT EXISTS gemini_quota (
                    id INTEGER PRIMARY KEY,
                    api_key_index INTEGER DEFAULT 0,
                    requests_made INTEGER DEFAULT 0,
                    last_reset_date TEXT,
                    quota_exceeded BOOLEAN DEFAULT 0,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE IF NOT EXISTS statistics (
                    id INTEGER PRIMARY KEY,
                    key TEXT UNIQUE,
                    value TEXT,
                    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
                );",
            )
            .context("failed to initialize store schema")?;

        // Seed the single-row tables on first run.
        let control_rows: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM processing_control", [], |r| r.get(0))?;
        if control_rows == 0 {
            self.conn.execute(
                "INSERT INTO processing_control
                 (last_processed_post_id, last_processed_date, total_posts_processed)
                 VALUES (0, ?1, 0)",
                params![Utc::now().to_rfc3339()],
            )?;
        }

        let quota_rows: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM gemini_quota", [], |r| r.get(0))?;
        if quota_rows == 0 {
            self.conn.execute(
                "INSERT INTO gemini_quota
                 (api_key_index, requests_made, last_reset_date, quota_exceeded)
                 VALUES (0, 0, ?1, 0)",
                params![Utc::now().to_rfc3339()],
            )?;
        }

        tracing::debug!("progress store schema ready");
        Ok(())
    }

    // ── Processing cursor ──────────────────────────────────────────────

    pub fn last_processed_post_id(&self) -> Result<u64> {
        let id: i64 = self
            .conn
            .query_row(
                "SELECT last_processed_post_id FROM processing_control WHERE id = 1",
                [],
                |r| r.get(0),
            )
            .context("failed to read processing cursor")?;
        Ok(id.max(0) as u64)
    }

    /// Advance the cursor to `post_id` and bump the processed total. Only
    /// called after a post has been durably written back.
    pub fn advance_cursor(&self, post_id: u64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE processing_control
                 SET last_processed_post_id = ?1,
                     last_processed_date = ?2,
                     updated_at = ?2,
                     total_posts_processed = total_posts_processed + 1
                 WHERE id = 1",
                params![post_id as i64, now],
            )
            .context("failed to advance processing cursor")?;
        tracing::info!(post_id, "processing cursor advanced");
        Ok(())
    }

    pub fn total_posts_processed(&self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT total_posts_processed FROM processing_control WHERE id = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    // ── Processing log ─────────────────────────────────────────────────

    pub fn log_processing(
        &self,
        post_id: u64,
        post_title: &str,
        action: &str,
        status: LogStatus,
        details: &str,
        processing_time: f64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO processing_logs
                 (post_id, post_title, action, status, details, processing_time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    post_id as i64,
                    post_title,
                    action,
                    status.as_str(),
                    details,
                    processing_time,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("failed to append processing log entry")?;
        tracing::debug!(post_id, action, status = status.as_str(), "log entry recorded");
        Ok(())
    }

    pub fn recent_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT post_id, post_title, action, status, details, processing_time, created_at
             FROM processing_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |r| {
            Ok(LogEntry {
                post_id: r.get::<_, i64>(0)?.max(0) as u64,
                post_title: r.get(1)?,
                action: r.get(2)?,
                status: r.get(3)?,
                details: r.get(4)?,
                processing_time: r.get(5)?,
                created_at: r.get(6)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    // ── Credential rotation state ──────────────────────────────────────

    pub fn rotation_state(&self) -> Result<RotationState> {
        let state = self
            .conn
            .query_row(
                "SELECT api_key_index, requests_made, quota_exceeded, last_reset_date
                 FROM gemini_quota WHERE id = 1",
                [],
                |r| {
                    Ok(RotationState {
                        api_key_index: r.get::<_, i64>(0)?.max(0) as usize,
                        requests_made: r.get::<_, i64>(1)?.max(0) as u64,
                        quota_exceeded: r.get(2)?,
                        last_reset_date: r.get(3)?,
                    })
                },
            )
            .optional()
            .context("failed to read rotation state")?;
        Ok(state.unwrap_or_default())
    }

    pub fn update_rotation_state(
        &self,
        api_key_index: usize,
        requests_made: u64,
        quota_exceeded: bool,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE gemini_quota
                 SET api_key_index = ?1,
                     requests_made = ?2,
                     quota_exceeded = ?3,
                     updated_at = ?4
                 WHERE id = 1",
                params![
                    api_key_index as i64,
                    requests_made as i64,
                    quota_exceeded,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("failed to update rotation state")?;
        Ok(())
    }

    /// Reset counters on the active credential (daily quota reset).
    pub fn reset_rotation_counters(&self) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE gemini_quota
                 SET requests_made = 0,
                     quota_exceeded = 0,
                     last_reset_date = ?1,
                     updated_at = ?1
                 WHERE id = 1",
                params![now],
            )
            .context("failed to reset rotation counters")?;
        tracing::info!("rotation quota counters reset");
        Ok(())
    }

    // ── Statistics ─────────────────────────────────────────────────────

    pub fn set_statistic(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO statistics (key, value, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![key, value.to_string(), Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to set statistic {}", key))?;
        Ok(())
    }

    pub fn get_statistic(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM statistics WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_at_zero_and_advances() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.last_processed_post_id().unwrap(), 0);

        store.advance_cursor(42).unwrap();
        assert_eq!(store.last_processed_post_id().unwrap(), 42);
        assert_eq!(store.total_posts_processed().unwrap(), 1);

        store.advance_cursor(57).unwrap();
        assert_eq!(store.last_processed_post_id().unwrap(), 57);
        assert_eq!(store.total_posts_processed().unwrap(), 2);
    }

    #[test]
    fn test_log_entries_are_append_only_and_ordered() {
        let store = Store::open_in_memory().unwrap();
        store
            .log_processing(1, "First", "optimization", LogStatus::Success, "SEO Score: 80", 1.5)
            .unwrap();
        store
            .log_processing(2, "Second", "optimization", LogStatus::Error, "empty content", 0.1)
            .unwrap();

        let logs = store.recent_logs(10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].post_id, 2);
        assert_eq!(logs[0].status, "error");
        assert_eq!(logs[1].post_id, 1);
        assert_eq!(logs[1].details, "SEO Score: 80");
    }

    #[test]
    fn test_rotation_state_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let state = store.rotation_state().unwrap();
        assert_eq!(state.api_key_index, 0);
        assert!(!state.quota_exceeded);

        store.update_rotation_state(2, 999_999, true).unwrap();
        let state = store.rotation_state().unwrap();
        assert_eq!(state.api_key_index, 2);
        assert_eq!(state.requests_made, 999_999);
        assert!(state.quota_exceeded);

        store.reset_rotation_counters().unwrap();
        let state = store.rotation_state().unwrap();
        assert_eq!(state.requests_made, 0);
        assert!(!state.quota_exceeded);
        // Index is preserved across counter resets.
        assert_eq!(state.api_key_index, 2);
    }

    #[test]
    fn test_statistics_round_trip_json() {
        let store = Store::open_in_memory().unwrap();
        let value = serde_json::json!({"posts_success": 3, "posts_error": 1});
        store.set_statistic("last_cycle_result", &value).unwrap();
        assert_eq!(store.get_statistic("last_cycle_result").unwrap(), Some(value));
        assert_eq!(store.get_statistic("missing").unwrap(), None);
    }
}

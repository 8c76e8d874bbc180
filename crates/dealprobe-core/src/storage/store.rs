use anyhow::Context;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Durable key-value persistence for run results, one JSON document per
/// test surface. Loads are tolerant (missing key or corrupt JSON yields the
/// caller's fallback) and saves are best-effort: a failed save is logged and
/// swallowed, never surfaced to the run. Concurrent writers are
/// last-writer-wins by design.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open results db")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory db")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )?;
        Ok(())
    }

    /// Returns the stored value for `key`, or `fallback` on any failure:
    /// missing key, corrupt JSON, or a shape that no longer matches the
    /// current catalog types. Never errors.
    pub fn load<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let raw = {
            let conn = self.conn.lock().unwrap();
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .ok()
        };
        match raw {
            Some(s) => match serde_json::from_str(&s) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(key, error = %e, "stored value unreadable, using fallback");
                    fallback
                }
            },
            None => fallback,
        }
    }

    /// Serializes and stores `value` under `key`. Serialization or storage
    /// failure is logged and swallowed; a failed save must not block a run.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize value, save skipped");
                return;
            }
        };
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        if let Err(e) = conn.execute(
            "INSERT INTO kv(key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            params![key, json, now],
        ) {
            tracing::warn!(key, error = %e, "failed to persist value");
        }
    }

    /// Records the completion timestamp for a run surface under `<key>-ts`.
    pub fn save_completed_at(&self, key: &str) {
        let ts = chrono::Utc::now().to_rfc3339();
        self.save(&format!("{}-ts", key), &ts);
    }

    /// Completion timestamp of the last finished run, if any.
    pub fn last_completed_at(&self, key: &str) -> Option<String> {
        self.load::<Option<String>>(&format!("{}-ts", key), None)
    }

    /// Raw write used by tests to simulate corruption from another writer.
    #[doc(hidden)]
    pub fn put_raw(&self, key: &str, raw: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute(
            "INSERT INTO kv(key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            params![key, raw, now],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckResult, CheckStatus};

    #[test]
    fn test_round_trip_is_deep_equal() {
        let store = Store::memory().unwrap();
        let results = vec![
            CheckResult {
                category: "schema".into(),
                name: "listings readable".into(),
                status: CheckStatus::Pass,
                error: None,
                duration_ms: Some(42),
            },
            CheckResult {
                category: "cleanup".into(),
                name: "remove test listings".into(),
                status: CheckStatus::Warn,
                error: Some("result set was empty".into()),
                duration_ms: Some(7),
            },
        ];
        store.save("checks", &results);
        let loaded: Vec<CheckResult> = store.load("checks", Vec::new());
        assert_eq!(serde_json::to_value(&loaded).unwrap(), serde_json::to_value(&results).unwrap());
    }

    #[test]
    fn test_missing_key_yields_fallback() {
        let store = Store::memory().unwrap();
        let loaded: Vec<CheckResult> = store.load("never-written", Vec::new());
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupt_value_yields_fallback_without_panicking() {
        let store = Store::memory().unwrap();
        store.put_raw("checks", "{this is not json");
        let loaded: Vec<CheckResult> = store.load("checks", Vec::new());
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_completion_timestamp_round_trip() {
        let store = Store::memory().unwrap();
        assert!(store.last_completed_at("checks").is_none());
        store.save_completed_at("checks");
        let ts = store.last_completed_at("checks").unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_last_writer_wins() {
        let store = Store::memory().unwrap();
        store.save("checks", &vec!["a"]);
        store.save("checks", &vec!["b"]);
        let loaded: Vec<String> = store.load("checks", Vec::new());
        assert_eq!(loaded, vec!["b".to_string()]);
    }
}

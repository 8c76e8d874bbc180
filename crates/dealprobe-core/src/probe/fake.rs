use super::{Collection, Filter, Probe};
use crate::cancel::CancelToken;
use crate::model::ChatEnvelope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::time::Duration;

/// Scriptable in-memory probe. Used by the test suite and by `--dry-run`
/// style invocations; never talks to the network.
#[derive(Default)]
pub struct FakeProbe {
    rows: Mutex<HashMap<String, Vec<serde_json::Value>>>,
    read_errors: Mutex<HashMap<String, String>>,
    procedure_errors: Mutex<HashMap<String, String>>,
    function_errors: Mutex<HashMap<String, String>>,
    chat_script: Mutex<Vec<ChatEnvelope>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_rows(&self, collection: &str, rows: Vec<serde_json::Value>) {
        self.rows
            .lock()
            .unwrap()
            .insert(collection.to_string(), rows);
    }

    pub fn fail_reads(&self, collection: &str, message: &str) {
        self.read_errors
            .lock()
            .unwrap()
            .insert(collection.to_string(), message.to_string());
    }

    pub fn fail_procedure(&self, name: &str, message: &str) {
        self.procedure_errors
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
    }

    pub fn fail_function(&self, name: &str, message: &str) {
        self.function_errors
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
    }

    /// Queues one chat envelope; envelopes are consumed in order, and an
    /// exhausted script yields an empty envelope.
    pub fn push_chat(&self, envelope: ChatEnvelope) {
        self.chat_script.lock().unwrap().push(envelope);
    }

    /// Ordered log of every probe call made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn read_collection(
        &self,
        collection: &Collection,
        _columns: &str,
        filters: &[Filter<'_>],
        limit: u32,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let name = collection.name().to_string();
        self.log(format!("read {}", name));
        if let Some(msg) = self.read_errors.lock().unwrap().get(&name) {
            anyhow::bail!("read {} failed: {}", name, msg);
        }
        let rows = self.rows.lock().unwrap();
        let all = rows.get(&name).cloned().unwrap_or_default();
        let filtered: Vec<_> = all
            .into_iter()
            .filter(|row| {
                filters.iter().all(|(col, value)| {
                    row.get(col)
                        .map(|v| match v {
                            serde_json::Value::String(s) => s == value,
                            other => other.to_string() == *value,
                        })
                        .unwrap_or(false)
                })
            })
            .take(limit as usize)
            .collect();
        Ok(filtered)
    }

    async fn insert_record(
        &self,
        collection: &Collection,
        mut row: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let name = collection.name().to_string();
        self.log(format!("insert {}", name));
        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        row["id"] = serde_json::Value::String(id);
        self.rows
            .lock()
            .unwrap()
            .entry(name)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update_record(
        &self,
        collection: &Collection,
        id: &str,
        patch: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let name = collection.name().to_string();
        self.log(format!("update {} {}", name, id));
        let mut rows = self.rows.lock().unwrap();
        let list = rows
            .get_mut(&name)
            .ok_or_else(|| anyhow::anyhow!("update {}: no rows", name))?;
        let row = list
            .iter_mut()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
            .ok_or_else(|| anyhow::anyhow!("update {} id={}: not found", name, id))?;
        if let (Some(obj), Some(patch_obj)) = (row.as_object_mut(), patch.as_object()) {
            for (k, v) in patch_obj {
                obj.insert(k.clone(), v.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete_record(&self, collection: &Collection, id: &str) -> anyhow::Result<()> {
        let name = collection.name().to_string();
        self.log(format!("delete {} {}", name, id));
        let mut rows = self.rows.lock().unwrap();
        if let Some(list) = rows.get_mut(&name) {
            list.retain(|r| r.get("id").and_then(|v| v.as_str()) != Some(id));
        }
        Ok(())
    }

    async fn call_procedure(
        &self,
        name: &str,
        _args: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.log(format!("rpc {}", name));
        if let Some(msg) = self.procedure_errors.lock().unwrap().get(name) {
            anyhow::bail!("rpc {}: {}", name, msg);
        }
        Ok(serde_json::json!({ "ok": true }))
    }

    async fn invoke_function(
        &self,
        name: &str,
        _body: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.log(format!("function {}", name));
        if let Some(msg) = self.function_errors.lock().unwrap().get(name) {
            anyhow::bail!("function {}: {}", name, msg);
        }
        Ok(serde_json::json!({ "ok": true }))
    }

    async fn chat(
        &self,
        query: &str,
        _timeout: Duration,
        _cancel: &CancelToken,
    ) -> anyhow::Result<ChatEnvelope> {
        self.log(format!("chat {}", query));
        let mut script = self.chat_script.lock().unwrap();
        if script.is_empty() {
            Ok(ChatEnvelope::default())
        } else {
            Ok(script.remove(0))
        }
    }
}

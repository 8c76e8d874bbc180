use super::sse::{apply_event, ChatEvent, SseDecoder};
use super::{Collection, Filter, Probe};
use crate::cancel::CancelToken;
use crate::model::ChatEnvelope;
use async_trait::async_trait;
use tokio::time::{Duration, Instant};

/// Probe client for the hosted backend: PostgREST-style collection reads and
/// writes, RPCs, edge functions, and the streaming chat endpoint. One
/// bearer credential covers all surfaces.
#[derive(Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_path: String,
}

impl HttpProbe {
    pub fn new(base_url: &str, api_key: &str, chat_path: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chat_path: chat_path.to_string(),
        }
    }

    fn rest_url(&self, collection: &Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.name())
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_key).header("apikey", &self.api_key)
    }

    /// Sends the request, normalizing transport failures into messages that
    /// carry the documented network markers and non-2xx responses into
    /// structured application errors carrying the backend's body text.
    async fn send_json(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("NetworkError: {}: {}", what, e))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("NetworkError: {}: body read failed: {}", what, e))?;
        if !status.is_success() {
            anyhow::bail!("{}: HTTP {}: {}", what, status.as_u16(), body.trim());
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("{}: invalid JSON response: {}", what, e))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn read_collection(
        &self,
        collection: &Collection,
        columns: &str,
        filters: &[Filter<'_>],
        limit: u32,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut query: Vec<(String, String)> = vec![
            ("select".into(), columns.to_string()),
            ("limit".into(), limit.to_string()),
        ];
        for (col, value) in filters {
            query.push(((*col).to_string(), format!("eq.{}", value)));
        }
        let req = self.http.get(self.rest_url(collection)).query(&query);
        let what = format!("read {}", collection.name());
        let value = self.send_json(req, &what).await?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{}: expected a row array, got {}", what, value))
    }

    async fn insert_record(
        &self,
        collection: &Collection,
        row: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let req = self
            .http
            .post(self.rest_url(collection))
            .header("Prefer", "return=representation")
            .json(&row);
        let what = format!("insert into {}", collection.name());
        let value = self.send_json(req, &what).await?;
        // PostgREST returns the created rows as an array.
        match value {
            serde_json::Value::Array(mut rows) if !rows.is_empty() => Ok(rows.remove(0)),
            other => Ok(other),
        }
    }

    async fn update_record(
        &self,
        collection: &Collection,
        id: &str,
        patch: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let req = self
            .http
            .patch(self.rest_url(collection))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch);
        let what = format!("update {} id={}", collection.name(), id);
        let value = self.send_json(req, &what).await?;
        match value {
            serde_json::Value::Array(mut rows) if !rows.is_empty() => Ok(rows.remove(0)),
            other => Ok(other),
        }
    }

    async fn delete_record(&self, collection: &Collection, id: &str) -> anyhow::Result<()> {
        let req = self
            .http
            .delete(self.rest_url(collection))
            .query(&[("id", format!("eq.{}", id))]);
        let what = format!("delete from {} id={}", collection.name(), id);
        self.send_json(req, &what).await?;
        Ok(())
    }

    async fn call_procedure(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        let req = self.http.post(url).json(&args);
        self.send_json(req, &format!("rpc {}", name)).await
    }

    async fn invoke_function(
        &self,
        name: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        let req = self.http.post(url).json(&body);
        self.send_json(req, &format!("function {}", name)).await
    }

    async fn chat(
        &self,
        query: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> anyhow::Result<ChatEnvelope> {
        let url = format!("{}{}", self.base_url, self.chat_path);
        let conversation_id = format!("qa-{}", chrono::Utc::now().timestamp_millis());
        let body = serde_json::json!({
            "query": query,
            "conversation_id": conversation_id,
            "history": [],
        });

        let resp = self
            .authed(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("NetworkError: chat: {}", e))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat: HTTP {}: {}", status.as_u16(), text.trim());
        }

        let mut resp = resp;
        let mut env = ChatEnvelope::default();
        let mut decoder = SseDecoder::new();
        let deadline = Instant::now() + timeout;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    env.error.get_or_insert_with(|| "chat aborted: cancelled".to_string());
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    env.error = Some(format!("chat timed out after {}s", timeout.as_secs()));
                    break;
                }
                chunk = resp.chunk() => match chunk {
                    Ok(Some(bytes)) => {
                        for frame in decoder.feed(&bytes) {
                            if let Some(event) = ChatEvent::from_frame(&frame) {
                                apply_event(&mut env, event);
                            }
                        }
                    }
                    Ok(None) => {
                        if let Some(frame) = decoder.finish() {
                            if let Some(event) = ChatEvent::from_frame(&frame) {
                                apply_event(&mut env, event);
                            }
                        }
                        break;
                    }
                    Err(e) => {
                        env.error = Some(format!("NetworkError: chat stream interrupted: {}", e));
                        break;
                    }
                }
            }
        }

        // Dropping the response here tears down the underlying connection on
        // timeout or cancellation; the partial envelope is still returned.
        Ok(env)
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target-environment configuration for a probe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Base URL of the hosted backend, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Bearer credential. `DEALPROBE_API_KEY` overrides the file value so
    /// the key never has to live in the config on disk.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_seconds: u64,
    #[serde(default = "default_delay")]
    pub inter_call_delay_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_chat_path() -> String {
    "/functions/v1/command-center".to_string()
}
fn default_chat_timeout() -> u64 {
    60
}
fn default_delay() -> u64 {
    400
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    1500
}

impl TargetConfig {
    pub fn run_policy(&self) -> crate::engine::RunPolicy {
        crate::engine::RunPolicy {
            inter_call_delay: std::time::Duration::from_millis(self.inter_call_delay_ms),
            retry: crate::retry::RetryPolicy {
                max_attempts: self.retry_attempts,
                backoff: std::time::Duration::from_millis(self.retry_backoff_ms),
            },
            chat_timeout: std::time::Duration::from_secs(self.chat_timeout_seconds),
        }
    }
}

/// Loads the YAML config. Unknown keys are warnings normally and hard
/// errors in strict mode; `_`-prefixed and `x-` keys are anchor conventions
/// and always tolerated.
pub fn load_config(path: &Path, strict: bool) -> anyhow::Result<TargetConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;

    let mut ignored_keys = std::collections::HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let mut cfg: TargetConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| anyhow::anyhow!("failed to parse config YAML: {}", e))?;

    let meaningful: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful.is_empty() {
        if strict {
            anyhow::bail!(
                "unknown config fields in strict mode: {:?} (file: {})",
                meaningful,
                path.display()
            );
        }
        tracing::warn!(keys = ?meaningful, "ignored unknown config fields");
    }

    if let Ok(key) = std::env::var("DEALPROBE_API_KEY") {
        cfg.api_key = key;
    }
    if cfg.base_url.trim().is_empty() {
        anyhow::bail!("config error: base_url is required");
    }
    if cfg.api_key.trim().is_empty() {
        anyhow::bail!("config error: api_key missing (set it in the config or DEALPROBE_API_KEY)");
    }

    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> anyhow::Result<()> {
    std::fs::write(
        path,
        r#"# dealprobe target environment
base_url: "https://your-project.supabase.co"
# Prefer the DEALPROBE_API_KEY environment variable over this field.
api_key: ""
chat_path: "/functions/v1/command-center"
chat_timeout_seconds: 60
inter_call_delay_ms: 400
retry_attempts: 3
retry_backoff_ms: 1500
"#,
    )
    .map_err(|e| anyhow::anyhow!("failed to write sample config: {}", e))?;
    Ok(())
}

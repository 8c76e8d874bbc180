use serde::{Deserialize, Serialize};

/// Terminal and transient states of one catalog check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Running,
    Pass,
    Fail,
    Warn,
}

impl CheckStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckStatus::Pass | CheckStatus::Fail | CheckStatus::Warn)
    }
}

/// States of one scenario. `Skip` is only ever assigned by a human verdict,
/// never by the runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Pending,
    Running,
    Pass,
    Fail,
    Skip,
}

impl ScenarioStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScenarioStatus::Pass | ScenarioStatus::Fail | ScenarioStatus::Skip
        )
    }
}

/// Result row for one check, keyed by `category` + `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub category: String,
    pub name: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl CheckResult {
    pub fn pending(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            status: CheckStatus::Pending,
            error: None,
            duration_ms: None,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.category.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Machine-checkable expectations attached to a scenario. Every field is
/// optional and independently combinable; an absent record on the scenario
/// means manual judgement only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoValidation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_routes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_contain_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not_contain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_response_length: Option<usize>,
    #[serde(default)]
    pub requires_tool_calls: bool,
}

/// One natural-language test prompt with documentation-only expected
/// behavior. Immutable after catalog construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub id: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub expected_behavior: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_cases: Vec<String>,
    pub severity: Severity,
    /// Multi-turn, UI-only, or destructive prompts are excluded from
    /// automatic batch runs and left to a human tester.
    #[serde(default)]
    pub manual_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<AutoValidation>,
}

/// A single named boolean judgement produced by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoCheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AutoCheckResult {
    pub fn passed(name: &str, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail,
        }
    }

    pub fn failed(name: &str, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail,
        }
    }
}

/// Result row for one scenario, mutated by both automatic runs and manual
/// tester verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub id: String,
    pub status: ScenarioStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_called: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_checks: Vec<AutoCheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioResult {
    pub fn pending(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: ScenarioStatus::Pending,
            notes: String::new(),
            last_tested: None,
            response_text: None,
            tools_called: Vec::new(),
            route_category: None,
            duration_ms: None,
            auto_checks: Vec::new(),
            error: None,
        }
    }
}

/// One capability invocation observed on the chat stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Routing decision reported by the command center before tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteDecision {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_considered: Vec<String>,
}

/// Normalized shape of one streamed chat response, accumulated event by
/// event and finalized when the stream closes or the call is aborted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl ChatEnvelope {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|t| t.name.as_str()).collect()
    }
}

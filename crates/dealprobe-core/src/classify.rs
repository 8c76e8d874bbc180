//! Error-message classification.
//!
//! The backend under test signals most conditions through free-text error
//! messages, so the patterns that decide fail-vs-warn live here as named
//! rules instead of being scattered through check bodies. Matching is
//! case-insensitive substring search throughout.

/// Terminal severity assigned to a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSeverity {
    /// Real defect; the check is marked failed.
    Fail,
    /// Benign precondition failure (missing seed data); downgraded so one
    /// empty environment does not block the whole suite.
    Warn,
}

struct Rule {
    name: &'static str,
    applies: fn(&str) -> bool,
    severity: FailureSeverity,
}

/// Ordered rule set; the first matching rule wins, anything unmatched is a
/// hard failure.
pub struct ErrorClassifier {
    rules: Vec<Rule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                // A missing table is a schema defect, never sparse data. This
                // must outrank the missing-relation rule below. Known to be
                // imprecise when the message phrases the table name without
                // the literal word "table".
                Rule {
                    name: "missing-table",
                    applies: |m| m.contains("does not exist") && m.contains("table"),
                    severity: FailureSeverity::Fail,
                },
                Rule {
                    name: "missing-relation",
                    applies: |m| m.contains("does not exist"),
                    severity: FailureSeverity::Warn,
                },
                Rule {
                    name: "no-seed-data",
                    applies: |m| m.contains("no test "),
                    severity: FailureSeverity::Warn,
                },
                Rule {
                    name: "empty-result",
                    applies: |m| m.contains("empty"),
                    severity: FailureSeverity::Warn,
                },
                Rule {
                    name: "sparse-data",
                    applies: |m| m.contains("expected multiple"),
                    severity: FailureSeverity::Warn,
                },
            ],
        }
    }
}

impl ErrorClassifier {
    pub fn classify(&self, message: &str) -> FailureSeverity {
        let lower = message.to_lowercase();
        for rule in &self.rules {
            if (rule.applies)(&lower) {
                tracing::debug!(rule = rule.name, "error matched classifier rule");
                return rule.severity;
            }
        }
        FailureSeverity::Fail
    }
}

/// Transport-level failures: the connection itself could not be established
/// or was interrupted. Always fatal, never evidence of a deployed endpoint.
pub fn is_network_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("failed to fetch")
        || lower.contains("networkerror")
        || lower.contains("net::err")
        || lower.contains("connection refused")
        || lower.contains("dns error")
        || lower.contains("timed out")
}

/// Rate-limit signals eligible for the retry policy.
pub fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
}

//! Scores a chat envelope against a scenario's auto-validation record.
//!
//! Pure and deterministic: no I/O, no hidden state, same ordered output for
//! the same inputs.

use crate::model::{AutoCheckResult, ChatEnvelope, ScenarioDefinition};

/// Produces the ordered list of pass/fail sub-checks for one scenario run.
///
/// The two baseline checks come first: "Response received" always, and a
/// failing "No errors" only when the envelope carries an error. Every other
/// sub-check is emitted only for fields actually present on the scenario's
/// auto-validation record.
pub fn run_auto_checks(
    scenario: &ScenarioDefinition,
    envelope: &ChatEnvelope,
) -> Vec<AutoCheckResult> {
    let mut checks = Vec::new();

    let text = envelope.text.trim();
    if text.is_empty() {
        checks.push(AutoCheckResult::failed(
            "Response received",
            Some("response text was empty".to_string()),
        ));
    } else {
        checks.push(AutoCheckResult::passed("Response received", None));
    }

    if let Some(err) = &envelope.error {
        checks.push(AutoCheckResult::failed(
            "No errors",
            Some(format!("envelope error: {}", err)),
        ));
    }

    let Some(auto) = &scenario.auto else {
        return checks;
    };

    if let Some(min) = auto.min_response_length {
        let actual = envelope.text.len();
        checks.push(AutoCheckResult {
            name: format!("Response >= {} chars", min),
            passed: actual >= min,
            detail: Some(format!("actual length {}", actual)),
        });
    }

    if !auto.expected_routes.is_empty() {
        let actual = envelope.route.as_ref().map(|r| r.category.as_str());
        let passed = actual.is_some_and(|c| auto.expected_routes.iter().any(|e| e == c));
        checks.push(AutoCheckResult {
            name: "Route category matches".to_string(),
            passed,
            detail: Some(format!(
                "expected one of {:?}, actual {}",
                auto.expected_routes,
                actual.unwrap_or("(none)")
            )),
        });
    }

    if !auto.expected_tools.is_empty() {
        let called = envelope.tool_names();
        let passed = auto.expected_tools.iter().any(|e| called.contains(&e.as_str()));
        checks.push(AutoCheckResult {
            name: "Expected tools called".to_string(),
            passed,
            detail: Some(format!(
                "expected any of {:?}, called {:?}",
                auto.expected_tools, called
            )),
        });
    }

    if auto.requires_tool_calls {
        let count = envelope.tool_calls.len();
        checks.push(AutoCheckResult {
            name: "Tool calls made".to_string(),
            passed: count > 0,
            detail: Some(format!("{} tool call(s) observed", count)),
        });
    }

    let lower = envelope.text.to_lowercase();

    if !auto.must_contain_any.is_empty() {
        let matched: Vec<&str> = auto
            .must_contain_any
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .map(|k| k.as_str())
            .collect();
        let passed = !matched.is_empty();
        let detail = if passed {
            format!("matched {:?}", matched)
        } else {
            format!("none of {:?} found", auto.must_contain_any)
        };
        checks.push(AutoCheckResult {
            name: "Expected content present".to_string(),
            passed,
            detail: Some(detail),
        });
    }

    if !auto.must_not_contain.is_empty() {
        let offending: Vec<&str> = auto
            .must_not_contain
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .map(|k| k.as_str())
            .collect();
        let passed = offending.is_empty();
        let detail = if passed {
            None
        } else {
            Some(format!("forbidden fragment(s) present: {:?}", offending))
        };
        checks.push(AutoCheckResult {
            name: "No hallucinated content".to_string(),
            passed,
            detail,
        });
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AutoValidation, RouteDecision, Severity, ToolCallRecord};

    fn scenario(auto: Option<AutoValidation>) -> ScenarioDefinition {
        ScenarioDefinition {
            id: "s1".into(),
            category: "search".into(),
            name: "test scenario".into(),
            description: String::new(),
            prompt: "Search knowledge base for deals on Mars.".into(),
            expected_behavior: vec![],
            edge_cases: vec![],
            severity: Severity::Medium,
            manual_only: false,
            auto,
        }
    }

    fn envelope(text: &str) -> ChatEnvelope {
        ChatEnvelope {
            text: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_auto_validation_yields_baseline_only() {
        let env = envelope("some reply");
        let checks = run_auto_checks(&scenario(None), &env);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name, "Response received");
        assert!(checks[0].passed);
    }

    #[test]
    fn test_envelope_error_adds_failing_no_errors_check() {
        let mut env = envelope("partial reply");
        env.error = Some("stream interrupted".into());
        let checks = run_auto_checks(&scenario(None), &env);
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[1].name, "No errors");
        assert!(!checks[1].passed);
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        let sc = scenario(Some(AutoValidation {
            expected_routes: vec!["search".into()],
            must_contain_any: vec!["hvac".into()],
            min_response_length: Some(10),
            ..Default::default()
        }));
        let env = envelope("Found three HVAC listings in Texas.");
        let first = run_auto_checks(&sc, &env);
        for _ in 0..5 {
            assert_eq!(run_auto_checks(&sc, &env), first);
        }
    }

    #[test]
    fn test_case_insensitive_keyword_match() {
        let sc = scenario(Some(AutoValidation {
            must_contain_any: vec!["HVAC".into()],
            ..Default::default()
        }));
        let env = envelope("...hvac deals...");
        let checks = run_auto_checks(&sc, &env);
        let contain = checks
            .iter()
            .find(|c| c.name == "Expected content present")
            .unwrap();
        assert!(contain.passed);
    }

    #[test]
    fn test_contain_and_not_contain_are_independent() {
        let sc = scenario(Some(AutoValidation {
            must_contain_any: vec!["hvac".into()],
            must_not_contain: vec!["the roi dashboard shows".into()],
            ..Default::default()
        }));
        let env = envelope("Two hvac listings matched your filters.");
        let checks = run_auto_checks(&sc, &env);
        let contain = checks
            .iter()
            .find(|c| c.name == "Expected content present")
            .unwrap();
        let not_contain = checks
            .iter()
            .find(|c| c.name == "No hallucinated content")
            .unwrap();
        assert!(contain.passed);
        assert!(not_contain.passed);
    }

    #[test]
    fn test_route_category_membership() {
        let sc = scenario(Some(AutoValidation {
            expected_routes: vec!["search".into(), "analytics".into()],
            ..Default::default()
        }));
        let mut env = envelope("reply");
        env.route = Some(RouteDecision {
            category: "analytics".into(),
            tier: None,
            tools_considered: vec![],
        });
        let checks = run_auto_checks(&sc, &env);
        assert!(checks.iter().find(|c| c.name == "Route category matches").unwrap().passed);

        env.route = Some(RouteDecision {
            category: "smalltalk".into(),
            tier: None,
            tools_considered: vec![],
        });
        let checks = run_auto_checks(&sc, &env);
        let route = checks.iter().find(|c| c.name == "Route category matches").unwrap();
        assert!(!route.passed);
        assert!(route.detail.as_ref().unwrap().contains("smalltalk"));
    }

    #[test]
    fn test_expected_tools_any_of() {
        let sc = scenario(Some(AutoValidation {
            expected_tools: vec!["search_listings".into(), "query_listings".into()],
            requires_tool_calls: true,
            ..Default::default()
        }));
        let mut env = envelope("reply");
        env.tool_calls.push(ToolCallRecord {
            name: "query_listings".into(),
            id: "t1".into(),
            success: Some(true),
        });
        let checks = run_auto_checks(&sc, &env);
        assert!(checks.iter().find(|c| c.name == "Expected tools called").unwrap().passed);
        assert!(checks.iter().find(|c| c.name == "Tool calls made").unwrap().passed);
    }

    #[test]
    fn test_mars_scenario_honest_miss_passes() {
        // The end-to-end example: an honest "nothing found" reply passes all
        // three checks.
        let sc = scenario(Some(AutoValidation {
            min_response_length: Some(30),
            must_not_contain: vec![
                "here are the mars deals".into(),
                "found 5 results about mars".into(),
            ],
            ..Default::default()
        }));
        let env = envelope("I couldn't find any results for that search.");
        let checks = run_auto_checks(&sc, &env);
        let summary: Vec<(&str, bool)> =
            checks.iter().map(|c| (c.name.as_str(), c.passed)).collect();
        assert_eq!(
            summary,
            vec![
                ("Response received", true),
                ("Response >= 30 chars", true),
                ("No hallucinated content", true),
            ]
        );
    }

    #[test]
    fn test_mars_scenario_hallucination_fails_with_fragment_named() {
        let sc = scenario(Some(AutoValidation {
            min_response_length: Some(30),
            must_not_contain: vec![
                "here are the mars deals".into(),
                "found 5 results about mars".into(),
            ],
            ..Default::default()
        }));
        let env = envelope("Found 5 results about Mars: Olympus Mons Mining Co...");
        let checks = run_auto_checks(&sc, &env);
        let not_contain = checks
            .iter()
            .find(|c| c.name == "No hallucinated content")
            .unwrap();
        assert!(!not_contain.passed);
        assert!(not_contain
            .detail
            .as_ref()
            .unwrap()
            .contains("found 5 results about mars"));
    }

    #[test]
    fn test_min_length_reports_actual() {
        let sc = scenario(Some(AutoValidation {
            min_response_length: Some(100),
            ..Default::default()
        }));
        let env = envelope("short");
        let checks = run_auto_checks(&sc, &env);
        let len = checks.iter().find(|c| c.name == "Response >= 100 chars").unwrap();
        assert!(!len.passed);
        assert_eq!(len.detail.as_deref(), Some("actual length 5"));
    }
}

use crate::model::{CheckResult, CheckStatus, ScenarioResult, ScenarioStatus};

pub fn print_check_summary(results: &[CheckResult]) {
    let mut pass = 0;
    let mut fail = 0;
    let mut warn = 0;
    let mut pending = 0;

    eprintln!("\n{} checks:", results.len());
    for r in results {
        let duration = r
            .duration_ms
            .map(|d| format!("({:.1}s)", d as f64 / 1000.0))
            .unwrap_or_default();
        let label = format!("{} / {}", r.category, r.name);
        match r.status {
            CheckStatus::Pass => {
                pass += 1;
                eprintln!("✅ {:<48} {}", label, duration);
            }
            CheckStatus::Warn => {
                warn += 1;
                eprintln!("⚠️  {:<48} {}", label, duration);
                if let Some(e) = &r.error {
                    eprintln!("    {}", e);
                }
            }
            CheckStatus::Fail => {
                fail += 1;
                eprintln!("❌ {:<48} {}", label, duration);
                if let Some(e) = &r.error {
                    eprintln!("    {}", e);
                }
            }
            CheckStatus::Pending | CheckStatus::Running => {
                pending += 1;
                eprintln!("⏸  {:<48} (not run)", label);
            }
        }
    }
    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "Summary: {} passed, {} failed, {} warn, {} not run",
        pass, fail, warn, pending
    );
}

pub fn print_scenario_summary(results: &[ScenarioResult]) {
    let mut pass = 0;
    let mut fail = 0;
    let mut skip = 0;
    let mut pending = 0;

    eprintln!("\n{} scenarios:", results.len());
    for r in results {
        let duration = r
            .duration_ms
            .map(|d| format!("({:.1}s)", d as f64 / 1000.0))
            .unwrap_or_default();
        match r.status {
            ScenarioStatus::Pass => {
                pass += 1;
                eprintln!("✅ {:<32} {}", r.id, duration);
            }
            ScenarioStatus::Skip => {
                skip += 1;
                eprintln!("⏭️  {:<32} SKIPPED", r.id);
            }
            ScenarioStatus::Fail => {
                fail += 1;
                eprintln!("❌ {:<32} {}", r.id, duration);
                if let Some(e) = &r.error {
                    eprintln!("    {}", e);
                }
                for c in r.auto_checks.iter().filter(|c| !c.passed) {
                    match &c.detail {
                        Some(d) => eprintln!("    → {}: {}", c.name, d),
                        None => eprintln!("    → {}", c.name),
                    }
                }
            }
            ScenarioStatus::Pending | ScenarioStatus::Running => {
                pending += 1;
                eprintln!("⏸  {:<32} (not run)", r.id);
            }
        }
        if !r.notes.is_empty() {
            eprintln!("    notes: {}", r.notes);
        }
    }
    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "Summary: {} passed, {} failed, {} skipped, {} not run",
        pass, fail, skip, pending
    );
}

/// Concatenated failure text for pasting into a bug report: one block per
/// failing entry with category, name, and the raw error.
pub fn failed_report(checks: &[CheckResult], scenarios: &[ScenarioResult]) -> String {
    let mut out = String::new();
    for r in checks.iter().filter(|r| r.status == CheckStatus::Fail) {
        out.push_str(&format!(
            "[{}] {}\n  {}\n",
            r.category,
            r.name,
            r.error.as_deref().unwrap_or("(no error recorded)")
        ));
    }
    for r in scenarios.iter().filter(|r| r.status == ScenarioStatus::Fail) {
        out.push_str(&format!(
            "[scenario] {}\n  {}\n",
            r.id,
            r.error.as_deref().unwrap_or("(auto-checks failed)")
        ));
        for c in r.auto_checks.iter().filter(|c| !c.passed) {
            match &c.detail {
                Some(d) => out.push_str(&format!("  - {}: {}\n", c.name, d)),
                None => out.push_str(&format!("  - {}\n", c.name)),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AutoCheckResult;

    #[test]
    fn test_failed_report_includes_only_failures() {
        let checks = vec![
            CheckResult {
                category: "schema".into(),
                name: "listings readable".into(),
                status: CheckStatus::Pass,
                error: None,
                duration_ms: Some(10),
            },
            CheckResult {
                category: "integration".into(),
                name: "rpc dashboard_metrics reachable".into(),
                status: CheckStatus::Fail,
                error: Some("function dashboard_metrics does not exist".into()),
                duration_ms: Some(20),
            },
        ];
        let scenarios = vec![ScenarioResult {
            status: ScenarioStatus::Fail,
            auto_checks: vec![AutoCheckResult::failed(
                "No hallucinated content",
                Some("forbidden fragment(s) present: [\"found 5 results about mars\"]".into()),
            )],
            ..ScenarioResult::pending("kb-search-empty")
        }];

        let report = failed_report(&checks, &scenarios);
        assert!(!report.contains("listings readable"));
        assert!(report.contains("rpc dashboard_metrics reachable"));
        assert!(report.contains("kb-search-empty"));
        assert!(report.contains("No hallucinated content"));
    }

    #[test]
    fn test_failed_report_empty_when_all_green() {
        assert!(failed_report(&[], &[]).is_empty());
    }
}

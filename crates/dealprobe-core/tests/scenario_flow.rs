use dealprobe_core::cancel::CancelToken;
use dealprobe_core::engine::{RunOutcome, RunPolicy, RunSelection, ScenarioRunner, SCENARIOS_KEY};
use dealprobe_core::model::{
    AutoValidation, ChatEnvelope, RouteDecision, ScenarioDefinition, ScenarioResult,
    ScenarioStatus, Severity, ToolCallRecord,
};
use dealprobe_core::probe::fake::FakeProbe;
use dealprobe_core::storage::Store;
use std::sync::Arc;
use tokio::time::Duration;

fn fast_policy() -> RunPolicy {
    RunPolicy {
        inter_call_delay: Duration::from_millis(1),
        ..RunPolicy::default()
    }
}

fn scenario(id: &str, auto: Option<AutoValidation>) -> ScenarioDefinition {
    ScenarioDefinition {
        id: id.to_string(),
        category: "search".to_string(),
        name: id.to_string(),
        description: String::new(),
        prompt: format!("prompt for {}", id),
        expected_behavior: Vec::new(),
        edge_cases: Vec::new(),
        severity: Severity::Medium,
        manual_only: false,
        auto,
    }
}

fn envelope(text: &str) -> ChatEnvelope {
    ChatEnvelope {
        text: text.to_string(),
        ..ChatEnvelope::default()
    }
}

#[tokio::test]
async fn test_scenario_run_records_response_and_scores_it() {
    let probe = Arc::new(FakeProbe::new());
    probe.push_chat(ChatEnvelope {
        text: "I searched the knowledge base and found 3 active SaaS listings.".into(),
        tool_calls: vec![ToolCallRecord {
            name: "search_listings".into(),
            id: "t1".into(),
            success: Some(true),
        }],
        route: Some(RouteDecision {
            category: "search".into(),
            tier: None,
            tools_considered: Vec::new(),
        }),
        error: None,
        cost_usd: Some(0.002),
    });

    let catalog = vec![scenario(
        "kb-search-basic",
        Some(AutoValidation {
            expected_routes: vec!["search".into()],
            expected_tools: vec!["search_listings".into()],
            min_response_length: Some(20),
            ..AutoValidation::default()
        }),
    )];

    let runner = ScenarioRunner::new(probe, Store::memory().unwrap(), fast_policy());
    let outcome = runner
        .run(&catalog, RunSelection::All, &CancelToken::new())
        .await;
    assert_eq!(outcome, RunOutcome::Done);

    let results = runner.results();
    assert_eq!(results[0].status, ScenarioStatus::Pass);
    assert_eq!(results[0].tools_called, vec!["search_listings".to_string()]);
    assert_eq!(results[0].route_category.as_deref(), Some("search"));
    assert!(results[0].last_tested.is_some());
    assert!(results[0].auto_checks.iter().all(|c| c.passed));
}

#[tokio::test]
async fn test_failing_auto_checks_mark_the_scenario_failed() {
    let probe = Arc::new(FakeProbe::new());
    probe.push_chat(envelope("Here are the Mars deals I found for you."));

    let catalog = vec![scenario(
        "kb-search-empty",
        Some(AutoValidation {
            min_response_length: Some(30),
            must_not_contain: vec!["here are the mars deals".into()],
            ..AutoValidation::default()
        }),
    )];

    let runner = ScenarioRunner::new(probe, Store::memory().unwrap(), fast_policy());
    runner
        .run(&catalog, RunSelection::All, &CancelToken::new())
        .await;

    let results = runner.results();
    assert_eq!(results[0].status, ScenarioStatus::Fail);
    let hallucination = results[0]
        .auto_checks
        .iter()
        .find(|c| c.name == "No hallucinated content")
        .unwrap();
    assert!(!hallucination.passed);
}

#[tokio::test]
async fn test_manual_only_scenarios_are_never_selected() {
    let probe = Arc::new(FakeProbe::new());
    probe.push_chat(envelope("should go to the automatic one"));

    let mut manual = scenario("ui-deep-link", None);
    manual.manual_only = true;
    let catalog = vec![manual, scenario("kb-search-basic", None)];

    let runner = ScenarioRunner::new(probe.clone(), Store::memory().unwrap(), fast_policy());
    runner
        .run(&catalog, RunSelection::All, &CancelToken::new())
        .await;

    let results = runner.results();
    assert_eq!(results[0].status, ScenarioStatus::Pending);
    assert_eq!(results[1].status, ScenarioStatus::Pass);
    assert_eq!(probe.calls(), vec!["chat prompt for kb-search-basic"]);
}

#[tokio::test]
async fn test_failed_only_reruns_failures_not_passes() {
    let store = Store::memory().unwrap();
    let prior = vec![
        ScenarioResult {
            status: ScenarioStatus::Pass,
            ..ScenarioResult::pending("a")
        },
        ScenarioResult {
            status: ScenarioStatus::Fail,
            ..ScenarioResult::pending("b")
        },
    ];
    store.save(SCENARIOS_KEY, &prior);

    let probe = Arc::new(FakeProbe::new());
    probe.push_chat(envelope("retry response"));
    let catalog = vec![scenario("a", None), scenario("b", None)];

    let runner = ScenarioRunner::new(probe.clone(), store, fast_policy());
    runner
        .run(&catalog, RunSelection::FailedOnly, &CancelToken::new())
        .await;

    assert_eq!(probe.calls(), vec!["chat prompt for b"]);
    let results = runner.results();
    assert_eq!(results[0].status, ScenarioStatus::Pass);
    assert_eq!(results[1].status, ScenarioStatus::Pass);
    assert_eq!(results[1].response_text.as_deref(), Some("retry response"));
}

#[tokio::test]
async fn test_manual_verdict_persists_and_reset_clears_it() {
    let store = Store::memory().unwrap();
    let catalog = vec![scenario("ui-deep-link", None)];
    let runner = ScenarioRunner::new(Arc::new(FakeProbe::new()), store.clone(), fast_policy());

    runner
        .set_verdict(
            &catalog,
            "ui-deep-link",
            ScenarioStatus::Skip,
            Some("blocked on staging data".into()),
        )
        .unwrap();

    // A fresh runner sees the verdict through the store.
    let second = ScenarioRunner::new(Arc::new(FakeProbe::new()), store, fast_policy());
    second.reconcile(&catalog);
    let results = second.results();
    assert_eq!(results[0].status, ScenarioStatus::Skip);
    assert_eq!(results[0].notes, "blocked on staging data");

    second.reset(&catalog, "ui-deep-link").unwrap();
    let results = second.results();
    assert_eq!(results[0].status, ScenarioStatus::Pending);
    assert!(results[0].notes.is_empty());
}

#[tokio::test]
async fn test_non_terminal_verdict_is_rejected() {
    let catalog = vec![scenario("a", None)];
    let runner = ScenarioRunner::new(
        Arc::new(FakeProbe::new()),
        Store::memory().unwrap(),
        fast_policy(),
    );
    assert!(runner
        .set_verdict(&catalog, "a", ScenarioStatus::Running, None)
        .is_err());
    assert!(runner
        .set_verdict(&catalog, "missing", ScenarioStatus::Pass, None)
        .is_err());
}

#[tokio::test]
async fn test_notes_survive_reruns() {
    let store = Store::memory().unwrap();
    let catalog = vec![scenario("a", None)];
    let probe = Arc::new(FakeProbe::new());
    probe.push_chat(envelope("first"));
    probe.push_chat(envelope("second"));

    let runner = ScenarioRunner::new(probe, store, fast_policy());
    runner
        .run(&catalog, RunSelection::All, &CancelToken::new())
        .await;
    runner
        .set_verdict(
            &catalog,
            "a",
            ScenarioStatus::Fail,
            Some("flaky on staging".into()),
        )
        .unwrap();

    runner
        .run(&catalog, RunSelection::All, &CancelToken::new())
        .await;
    let results = runner.results();
    assert_eq!(results[0].notes, "flaky on staging");
    assert_eq!(results[0].response_text.as_deref(), Some("second"));
}

//! Sequential run orchestration for both test surfaces.
//!
//! Exactly one entry is in flight at any time; rate-limit avoidance against
//! the system under test is a design goal, not an accident. Per-entry status
//! transitions are written to the shared result collection before the probe
//! call resolves, so readers observe `running` while the call is in flight.

use crate::cancel::CancelToken;
use crate::catalog::CheckDefinition;
use crate::classify::{ErrorClassifier, FailureSeverity};
use crate::context::RunContext;
use crate::model::{
    CheckResult, CheckStatus, ScenarioDefinition, ScenarioResult, ScenarioStatus,
};
use crate::probe::Probe;
use crate::retry::{with_retry, RetryPolicy};
use crate::scorer::run_auto_checks;
use crate::storage::Store;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

/// Store keys per test surface; `<key>-ts` holds the completion timestamp.
pub const CHECKS_KEY: &str = "dealprobe-checks";
pub const SCENARIOS_KEY: &str = "dealprobe-scenarios";

#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Minimum pause between consecutive probe calls in a batch. Skipped
    /// after the last entry and once cancelled.
    pub inter_call_delay: Duration,
    pub retry: RetryPolicy,
    pub chat_timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            inter_call_delay: Duration::from_millis(400),
            retry: RetryPolicy::default(),
            chat_timeout: Duration::from_secs(60),
        }
    }
}

/// Which catalog entries a batch run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSelection {
    All,
    FailedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Done,
    Cancelled,
}

/// Drives the check catalog.
pub struct CheckRunner {
    probe: Arc<dyn Probe>,
    store: Store,
    policy: RunPolicy,
    classifier: ErrorClassifier,
    results: Arc<Mutex<Vec<CheckResult>>>,
}

impl CheckRunner {
    pub fn new(probe: Arc<dyn Probe>, store: Store, policy: RunPolicy) -> Self {
        Self {
            probe,
            store,
            policy,
            classifier: ErrorClassifier::default(),
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Live snapshot of the shared result collection.
    pub fn results(&self) -> Vec<CheckResult> {
        self.results.lock().unwrap().clone()
    }

    /// Aligns the result collection with the catalog: exactly one result per
    /// catalog entry, persisted state reused where the key still exists,
    /// stale keys from an older catalog dropped silently, and rows left
    /// `running` by an interrupted run normalized back to pending.
    pub fn reconcile(&self, catalog: &[CheckDefinition]) {
        let persisted: Vec<CheckResult> = self.store.load(CHECKS_KEY, Vec::new());
        let mut by_key: std::collections::HashMap<(String, String), CheckResult> = persisted
            .into_iter()
            .map(|r| (r.key(), r))
            .collect();
        let mut fresh = Vec::with_capacity(catalog.len());
        for def in catalog {
            let key = (def.category.clone(), def.name.clone());
            let mut row = by_key
                .remove(&key)
                .unwrap_or_else(|| CheckResult::pending(&def.category, &def.name));
            if row.status == CheckStatus::Running {
                row.status = CheckStatus::Pending;
            }
            fresh.push(row);
        }
        *self.results.lock().unwrap() = fresh;
    }

    /// Runs the selected subset sequentially. Entries outside the selection
    /// keep their prior result untouched; no entry failure aborts the batch;
    /// only cancellation stops it early.
    pub async fn run(
        &self,
        catalog: &[CheckDefinition],
        selection: RunSelection,
        cancel: &CancelToken,
    ) -> RunOutcome {
        self.reconcile(catalog);
        let selected = self.select(selection);
        {
            let mut results = self.results.lock().unwrap();
            for &i in &selected {
                results[i] = CheckResult::pending(&catalog[i].category, &catalog[i].name);
            }
        }

        let ctx = Arc::new(tokio::sync::Mutex::new(RunContext::new()));

        for (pos, &i) in selected.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let def = &catalog[i];
            self.set_status(i, CheckStatus::Running, None, None);
            tracing::info!(category = %def.category, name = %def.name, "check started");

            let start = Instant::now();
            let probe = self.probe.clone();
            let ctx = ctx.clone();
            let outcome = with_retry(&self.policy.retry, cancel, || {
                let probe = probe.clone();
                let ctx = ctx.clone();
                async move {
                    let mut guard = ctx.lock().await;
                    def.run(probe.as_ref(), &mut guard).await
                }
            })
            .await;
            let duration = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => self.set_status(i, CheckStatus::Pass, None, Some(duration)),
                Err(e) => {
                    let msg = format!("{:#}", e);
                    let status = match self.classifier.classify(&msg) {
                        FailureSeverity::Warn => CheckStatus::Warn,
                        FailureSeverity::Fail => CheckStatus::Fail,
                    };
                    self.set_status(i, status, Some(msg), Some(duration));
                }
            }

            if pos + 1 < selected.len() && !cancel.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.inter_call_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        self.store.save(CHECKS_KEY, &self.results());
        self.store.save_completed_at(CHECKS_KEY);
        if cancel.is_cancelled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Done
        }
    }

    fn select(&self, selection: RunSelection) -> Vec<usize> {
        let results = self.results.lock().unwrap();
        results
            .iter()
            .enumerate()
            .filter(|(_, r)| match selection {
                RunSelection::All => true,
                RunSelection::FailedOnly => r.status == CheckStatus::Fail,
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn set_status(
        &self,
        index: usize,
        status: CheckStatus,
        error: Option<String>,
        duration_ms: Option<u64>,
    ) {
        let mut results = self.results.lock().unwrap();
        let row = &mut results[index];
        row.status = status;
        row.error = error;
        row.duration_ms = duration_ms;
    }
}

/// Drives the scenario catalog against the streaming chat endpoint.
pub struct ScenarioRunner {
    probe: Arc<dyn Probe>,
    store: Store,
    policy: RunPolicy,
    results: Arc<Mutex<Vec<ScenarioResult>>>,
}

impl ScenarioRunner {
    pub fn new(probe: Arc<dyn Probe>, store: Store, policy: RunPolicy) -> Self {
        Self {
            probe,
            store,
            policy,
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn results(&self) -> Vec<ScenarioResult> {
        self.results.lock().unwrap().clone()
    }

    /// Same reconciliation contract as the check runner, keyed by scenario
    /// id. Tester notes survive reconciliation.
    pub fn reconcile(&self, catalog: &[ScenarioDefinition]) {
        let persisted: Vec<ScenarioResult> = self.store.load(SCENARIOS_KEY, Vec::new());
        let mut by_id: std::collections::HashMap<String, ScenarioResult> = persisted
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        let mut fresh = Vec::with_capacity(catalog.len());
        for def in catalog {
            let mut row = by_id
                .remove(&def.id)
                .unwrap_or_else(|| ScenarioResult::pending(&def.id));
            if row.status == ScenarioStatus::Running {
                row.status = ScenarioStatus::Pending;
            }
            fresh.push(row);
        }
        *self.results.lock().unwrap() = fresh;
    }

    /// Runs the selected automatic subset. Manual-only scenarios are never
    /// part of an automatic selection; they stay pending until a human
    /// verdict. Results are persisted after every entry.
    pub async fn run(
        &self,
        catalog: &[ScenarioDefinition],
        selection: RunSelection,
        cancel: &CancelToken,
    ) -> RunOutcome {
        self.reconcile(catalog);
        let selected = self.select(catalog, selection);
        {
            let mut results = self.results.lock().unwrap();
            for &i in &selected {
                let notes = std::mem::take(&mut results[i].notes);
                results[i] = ScenarioResult {
                    notes,
                    ..ScenarioResult::pending(&catalog[i].id)
                };
            }
        }

        for (pos, &i) in selected.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let def = &catalog[i];
            self.set_running(i);
            tracing::info!(scenario = %def.id, "scenario started");

            let start = Instant::now();
            let outcome = with_retry(&self.policy.retry, cancel, || {
                self.probe
                    .chat(&def.prompt, self.policy.chat_timeout, cancel)
            })
            .await;
            let duration = start.elapsed().as_millis() as u64;

            // An entry interrupted by cancellation goes back to pending
            // rather than being left running or counted as a failure.
            if cancel.is_cancelled() {
                self.finalize(i, |row| {
                    row.status = ScenarioStatus::Pending;
                });
                break;
            }

            match outcome {
                Ok(envelope) => {
                    let auto_checks = run_auto_checks(def, &envelope);
                    let passed = auto_checks.iter().all(|c| c.passed);
                    self.finalize(i, |row| {
                        row.status = if passed {
                            ScenarioStatus::Pass
                        } else {
                            ScenarioStatus::Fail
                        };
                        row.last_tested = Some(chrono::Utc::now().to_rfc3339());
                        row.response_text = Some(envelope.text.clone());
                        row.tools_called =
                            envelope.tool_calls.iter().map(|t| t.name.clone()).collect();
                        row.route_category = envelope.route.as_ref().map(|r| r.category.clone());
                        row.duration_ms = Some(duration);
                        row.auto_checks = auto_checks;
                        row.error = envelope.error.clone();
                    });
                }
                Err(e) => {
                    let msg = format!("{:#}", e);
                    self.finalize(i, |row| {
                        row.status = ScenarioStatus::Fail;
                        row.last_tested = Some(chrono::Utc::now().to_rfc3339());
                        row.duration_ms = Some(duration);
                        row.error = Some(msg);
                    });
                }
            }

            if pos + 1 < selected.len() && !cancel.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.inter_call_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        self.store.save(SCENARIOS_KEY, &self.results());
        self.store.save_completed_at(SCENARIOS_KEY);
        if cancel.is_cancelled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Done
        }
    }

    /// Manual tester verdict: pass, fail, or skip, with optional notes.
    /// `skip` is only ever assigned here, never by the automatic runner.
    pub fn set_verdict(
        &self,
        catalog: &[ScenarioDefinition],
        id: &str,
        status: ScenarioStatus,
        notes: Option<String>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            status.is_terminal(),
            "manual verdict must be terminal, got {:?}",
            status
        );
        self.reconcile(catalog);
        self.mutate_by_id(id, |row| {
            row.status = status;
            row.last_tested = Some(chrono::Utc::now().to_rfc3339());
            if let Some(n) = notes {
                row.notes = n;
            }
        })
    }

    /// Clears a scenario back to pending, keeping nothing from prior runs.
    pub fn reset(&self, catalog: &[ScenarioDefinition], id: &str) -> anyhow::Result<()> {
        self.reconcile(catalog);
        self.mutate_by_id(id, |row| {
            *row = ScenarioResult::pending(&row.id.clone());
        })
    }

    fn mutate_by_id(
        &self,
        id: &str,
        f: impl FnOnce(&mut ScenarioResult),
    ) -> anyhow::Result<()> {
        {
            let mut results = self.results.lock().unwrap();
            let row = results
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| anyhow::anyhow!("unknown scenario id: {}", id))?;
            f(row);
        }
        self.store.save(SCENARIOS_KEY, &self.results());
        Ok(())
    }

    fn select(&self, catalog: &[ScenarioDefinition], selection: RunSelection) -> Vec<usize> {
        let results = self.results.lock().unwrap();
        catalog
            .iter()
            .enumerate()
            .filter(|(i, def)| {
                if def.manual_only {
                    return false;
                }
                match selection {
                    RunSelection::All => true,
                    RunSelection::FailedOnly => results[*i].status == ScenarioStatus::Fail,
                }
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn set_running(&self, index: usize) {
        self.results.lock().unwrap()[index].status = ScenarioStatus::Running;
        // Visible to readers before the probe call resolves, and persisted
        // like every other scenario mutation.
        self.store.save(SCENARIOS_KEY, &self.results());
    }

    fn finalize(&self, index: usize, f: impl FnOnce(&mut ScenarioResult)) {
        {
            let mut results = self.results.lock().unwrap();
            f(&mut results[index]);
        }
        self.store.save(SCENARIOS_KEY, &self.results());
    }
}

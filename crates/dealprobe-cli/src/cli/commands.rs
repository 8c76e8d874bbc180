use crate::cli::args::{
    ChecksSub, Cli, Command, InitArgs, RunArgs, ScenarioSub, ScenariosSub,
};
use dealprobe_core::cancel::CancelToken;
use dealprobe_core::catalog::{checks, scenarios};
use dealprobe_core::config::{load_config, write_sample_config, TargetConfig};
use dealprobe_core::engine::{
    CheckRunner, RunOutcome, RunSelection, ScenarioRunner, CHECKS_KEY, SCENARIOS_KEY,
};
use dealprobe_core::model::{CheckResult, CheckStatus, ScenarioResult, ScenarioStatus};
use dealprobe_core::probe::fake::FakeProbe;
use dealprobe_core::probe::http::HttpProbe;
use dealprobe_core::probe::Probe;
use dealprobe_core::report::console;
use dealprobe_core::storage::Store;
use std::path::Path;
use std::sync::Arc;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const FAILURES: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => cmd_init(&cli.config, &cli.db, args),
        Command::Checks(c) => match c.cmd {
            ChecksSub::Run(args) => {
                let env = Environment::connect(&cli.config, cli.strict_config, &cli.db)?;
                cmd_checks_run(env, args).await
            }
        },
        Command::Scenarios(s) => match s.cmd {
            ScenariosSub::Run(args) => {
                let env = Environment::connect(&cli.config, cli.strict_config, &cli.db)?;
                cmd_scenarios_run(env, args).await
            }
        },
        Command::Scenario(s) => {
            let store = open_store(&cli.db)?;
            match s.cmd {
                ScenarioSub::Set { id, verdict, notes } => {
                    cmd_scenario_set(store, &id, &verdict, notes)
                }
                ScenarioSub::Reset { id } => cmd_scenario_reset(store, &id),
                ScenarioSub::List => cmd_scenario_list(store),
            }
        }
        Command::Report => {
            let store = open_store(&cli.db)?;
            cmd_report(store)
        }
    }
}

/// Everything a live run needs: parsed config, HTTP probe, result store,
/// and a cancel token already wired to Ctrl-C.
struct Environment {
    config: TargetConfig,
    probe: Arc<dyn Probe>,
    store: Store,
    cancel: CancelToken,
}

impl Environment {
    fn connect(config_path: &Path, strict_config: bool, db: &Path) -> anyhow::Result<Self> {
        let config = load_config(config_path, strict_config)?;
        let probe: Arc<dyn Probe> = Arc::new(HttpProbe::new(
            &config.base_url,
            &config.api_key,
            &config.chat_path,
        ));
        let store = open_store(db)?;

        let cancel = CancelToken::new();
        let handle = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, finishing current entry...");
                handle.cancel();
            }
        });

        Ok(Self {
            config,
            probe,
            store,
            cancel,
        })
    }
}

fn open_store(db: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Store::open(db)
}

fn selection(args: &RunArgs) -> RunSelection {
    if args.failed_only {
        RunSelection::FailedOnly
    } else {
        RunSelection::All
    }
}

fn cmd_init(config: &Path, db: &Path, args: InitArgs) -> anyhow::Result<i32> {
    if config.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            config.display()
        );
    }
    write_sample_config(config)?;
    open_store(db)?;
    eprintln!("wrote {}", config.display());
    eprintln!("results db at {}", db.display());
    eprintln!("set DEALPROBE_API_KEY before running checks");
    Ok(exit_codes::OK)
}

async fn cmd_checks_run(env: Environment, args: RunArgs) -> anyhow::Result<i32> {
    let catalog = checks::build_catalog();
    let runner = CheckRunner::new(env.probe, env.store, env.config.run_policy());
    let outcome = runner.run(&catalog, selection(&args), &env.cancel).await;

    let results = runner.results();
    console::print_check_summary(&results);
    if outcome == RunOutcome::Cancelled {
        eprintln!("run cancelled; unfinished entries remain pending");
        return Ok(exit_codes::FAILURES);
    }
    let failed = results.iter().any(|r| r.status == CheckStatus::Fail);
    Ok(if failed {
        exit_codes::FAILURES
    } else {
        exit_codes::OK
    })
}

async fn cmd_scenarios_run(env: Environment, args: RunArgs) -> anyhow::Result<i32> {
    let catalog = scenarios::build_catalog();
    let runner = ScenarioRunner::new(env.probe, env.store, env.config.run_policy());
    let outcome = runner.run(&catalog, selection(&args), &env.cancel).await;

    let results = runner.results();
    console::print_scenario_summary(&results);
    if outcome == RunOutcome::Cancelled {
        eprintln!("run cancelled; unfinished entries remain pending");
        return Ok(exit_codes::FAILURES);
    }
    let failed = results.iter().any(|r| r.status == ScenarioStatus::Fail);
    Ok(if failed {
        exit_codes::FAILURES
    } else {
        exit_codes::OK
    })
}

fn parse_verdict(s: &str) -> anyhow::Result<ScenarioStatus> {
    match s {
        "pass" => Ok(ScenarioStatus::Pass),
        "fail" => Ok(ScenarioStatus::Fail),
        "skip" => Ok(ScenarioStatus::Skip),
        other => anyhow::bail!("verdict must be pass, fail, or skip (got {:?})", other),
    }
}

// Verdict bookkeeping never touches the network, so these construct the
// runner over a fake probe.
fn offline_runner(store: Store) -> ScenarioRunner {
    ScenarioRunner::new(
        Arc::new(FakeProbe::new()),
        store,
        dealprobe_core::engine::RunPolicy::default(),
    )
}

fn cmd_scenario_set(
    store: Store,
    id: &str,
    verdict: &str,
    notes: Option<String>,
) -> anyhow::Result<i32> {
    let status = parse_verdict(verdict)?;
    let catalog = scenarios::build_catalog();
    offline_runner(store).set_verdict(&catalog, id, status, notes)?;
    eprintln!("{} -> {}", id, verdict);
    Ok(exit_codes::OK)
}

fn cmd_scenario_reset(store: Store, id: &str) -> anyhow::Result<i32> {
    let catalog = scenarios::build_catalog();
    offline_runner(store).reset(&catalog, id)?;
    eprintln!("{} -> pending", id);
    Ok(exit_codes::OK)
}

fn cmd_scenario_list(store: Store) -> anyhow::Result<i32> {
    let catalog = scenarios::build_catalog();
    let runner = offline_runner(store);
    runner.reconcile(&catalog);
    let results = runner.results();
    for (def, result) in catalog.iter().zip(&results) {
        let manual = if def.manual_only { " (manual)" } else { "" };
        eprintln!(
            "{:<28} {:<16} {:?}{}",
            def.id, def.category, result.status, manual
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_report(store: Store) -> anyhow::Result<i32> {
    let check_results: Vec<CheckResult> = store.load(CHECKS_KEY, Vec::new());
    let scenario_results: Vec<ScenarioResult> = store.load(SCENARIOS_KEY, Vec::new());

    console::print_check_summary(&check_results);
    if let Some(ts) = store.last_completed_at(CHECKS_KEY) {
        eprintln!("checks last completed: {}", ts);
    }
    console::print_scenario_summary(&scenario_results);
    if let Some(ts) = store.last_completed_at(SCENARIOS_KEY) {
        eprintln!("scenarios last completed: {}", ts);
    }

    let failures = console::failed_report(&check_results, &scenario_results);
    if failures.is_empty() {
        Ok(exit_codes::OK)
    } else {
        // The paste-ready block goes to stdout so it can be piped.
        println!("{}", failures);
        Ok(exit_codes::FAILURES)
    }
}

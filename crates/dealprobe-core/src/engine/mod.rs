pub mod runner;

pub use runner::{
    CheckRunner, RunOutcome, RunPolicy, RunSelection, ScenarioRunner, CHECKS_KEY, SCENARIOS_KEY,
};

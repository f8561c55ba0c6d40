//! Regression runner: named scenarios, each in its own simulation.

use std::path::Path;

use futures::future::BoxFuture;
use num_format::{Locale, ToFormattedString};
use prettytable::{Cell, Row, Table};
use tracing::{error, info};

use crate::config::TbConfig;
use crate::env::{run_phy_test_with_stats, PhyEnv};
use crate::error::TbResult;
use crate::junit;
use crate::model::PhyModelConfig;

pub type TestFn = fn(PhyEnv) -> BoxFuture<'static, TbResult<()>>;

pub struct Test {
    pub name: String,
    pub generator: TestFn,
    pub model: PhyModelConfig,
}

#[derive(Clone, Debug)]
pub struct TestOutcome {
    pub name: String,
    /// Error text of a failed test.
    pub result: Result<(), String>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct TestSuite {
    name: String,
    cfg: TbConfig,
    tests: Vec<Test>,
}

impl TestSuite {
    pub fn new(name: &str, cfg: TbConfig) -> Self {
        Self {
            name: name.to_string(),
            cfg,
            tests: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn add(&mut self, name: &str, generator: TestFn) -> &mut Self {
        self.add_with_model(name, PhyModelConfig::default(), generator)
    }

    pub fn add_with_model(&mut self, name: &str, model: PhyModelConfig, generator: TestFn) -> &mut Self {
        self.tests.push(Test {
            name: name.to_string(),
            generator,
            model,
        });
        self
    }

    /// Runs every test in order. A failing test does not stop the suite.
    pub fn run(&self) -> Vec<TestOutcome> {
        self.tests
            .iter()
            .map(|test| {
                info!(test = %test.name, "running");
                let (stats, result) = run_phy_test_with_stats(&self.cfg, test.model, test.generator);
                if let Err(e) = &result {
                    error!(test = %test.name, "failed: {}", e);
                }
                TestOutcome {
                    name: test.name.clone(),
                    result: result.map_err(|e| e.to_string()),
                    time_secs: stats.wall_secs,
                    sim_time_ns: stats.sim_ns,
                }
            })
            .collect()
    }

    /// Runs the suite, logs the summary and writes a JUnit report to
    /// `junit_path`. Returns whether every test passed.
    pub fn run_and_report(&self, junit_path: &Path) -> TbResult<bool> {
        let outcomes = self.run();
        info!("{}\n{}", summary_line(&self.name, &outcomes), summary_table(&outcomes));
        junit::write_junit_xml(&self.name, &outcomes, junit_path)?;
        Ok(outcomes.iter().all(TestOutcome::passed))
    }
}

pub fn summary_line(suite: &str, outcomes: &[TestOutcome]) -> String {
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    format!(
        "{}: {}/{} passed, {} failed",
        suite,
        passed,
        outcomes.len(),
        outcomes.len() - passed
    )
}

pub(crate) fn cells(texts: &[&str]) -> Row {
    Row::new(texts.iter().map(|t| Cell::new(t)).collect())
}

pub fn summary_table(outcomes: &[TestOutcome]) -> Table {
    let mut table = Table::new();
    table.set_titles(cells(&["TEST", "RESULT", "SIM TIME (ns)", "REAL TIME (s)", "SPEED (ns/s)"]));
    for o in outcomes {
        let speed = match o.time_secs {
            t if t > 0.0 => (o.sim_time_ns / t) as u64,
            _ => 0,
        };
        table.add_row(cells(&[
            o.name.as_str(),
            if o.passed() { "PASS" } else { "FAIL" },
            (o.sim_time_ns as u64).to_formatted_string(&Locale::en).as_str(),
            format!("{:.3}", o.time_secs).as_str(),
            speed.to_formatted_string(&Locale::en).as_str(),
        ]));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, ok: bool) -> TestOutcome {
        TestOutcome {
            name: name.to_string(),
            result: if ok { Ok(()) } else { Err("boom".to_string()) },
            time_secs: 0.5,
            sim_time_ns: 1_250_000.0,
        }
    }

    #[test]
    fn summary_counts_failures() {
        let line = summary_line("regs", &[outcome("a", true), outcome("b", false)]);
        assert_eq!(line, "regs: 1/2 passed, 1 failed");
    }

    #[test]
    fn table_uses_thousands_separators() {
        let table = summary_table(&[outcome("a", true)]);
        let text = table.to_string();
        assert!(text.contains("1,250,000"));
        assert!(text.contains("2,500,000"));
        assert!(text.contains("PASS"));
    }
}

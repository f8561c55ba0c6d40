//! Concurrent assertions: a predicate re-evaluated on every change of its
//! sensitivity list while the test runs.

use prettytable::Table;
use tracing::{error, info};

use crate::error::{TbError, TbResult};
use crate::executor::{JoinHandle, Task};
use crate::shared::TbObj;
use crate::signal::SimObject;
use crate::sim_if::sim_time_ns;
use crate::test::cells;
use crate::trigger::Trigger;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssertionStats {
    pub triggered: u32,
    pub passed: u32,
    pub failed: u32,
    pub first_failure_ns: Option<f64>,
}

pub struct Assertion {
    name: String,
    stats: TbObj<AssertionStats>,
    handle: Option<JoinHandle>,
}

impl Assertion {
    /// Starts checking `check` whenever any signal in `sensitivity` changes.
    pub fn spawn(
        name: &str,
        sensitivity: Vec<SimObject>,
        check: impl Fn() -> bool + Send + 'static,
    ) -> Self {
        let stats = TbObj::new(AssertionStats::default());
        let task_stats = stats.clone();
        let task_name = name.to_string();
        let handle = Task::spawn(
            async move {
                loop {
                    Trigger::any_edge(&sensitivity).await?;
                    let ok = check();
                    let first_failure = task_stats.with_mut(|s| {
                        s.triggered += 1;
                        if ok {
                            s.passed += 1;
                            false
                        } else {
                            s.failed += 1;
                            s.first_failure_ns.is_none()
                        }
                    });
                    if first_failure {
                        let now = sim_time_ns();
                        task_stats.with_mut(|s| s.first_failure_ns = Some(now));
                        error!(sim_ns = now, assertion = %task_name, "assertion failed");
                    }
                }
            },
            name,
        );
        Self {
            name: name.to_string(),
            stats,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> AssertionStats {
        self.stats.get().clone()
    }

    /// Stops evaluating; the statistics stay readable.
    pub fn disable(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }

    pub fn result(&self) -> TbResult<()> {
        let s = self.stats();
        match s.failed {
            0 => Ok(()),
            n => Err(TbError::Check(format!(
                "assertion '{}' failed {} of {} times, first at {:.1} ns",
                self.name,
                n,
                s.triggered,
                s.first_failure_ns.unwrap_or_default()
            ))),
        }
    }
}

pub fn print_assertion_stats(assertions: &[&Assertion]) {
    info!("assertion statistics\n{}", assertion_stats_table(assertions));
}

pub fn assertion_stats_table(assertions: &[&Assertion]) -> Table {
    let mut table = Table::new();
    table.set_titles(cells(&["ASSERTION", "TRIGGERED", "PASSED", "FAILED"]));
    for a in assertions {
        let s = a.stats();
        table.add_row(cells(&[
            a.name(),
            s.triggered.to_string().as_str(),
            s.passed.to_string().as_str(),
            s.failed.to_string().as_str(),
        ]));
    }
    table
}

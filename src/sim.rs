use std::future::Future;
use std::time;

use tracing::{debug, warn};

use crate::error::{TbError, TbResult};
use crate::executor::{self, Task};
use crate::sim_if::{self, SimIf};

/// One simulation run: a backend, a test coroutine and everything it forks.
pub struct Simulation {
    backend: Option<Box<dyn SimIf>>,
    time_limit_ns: Option<u64>,
    final_time_ns: f64,
    wall_secs: f64,
}

/// Uninstalls the backend and drops pending tasks even if the test panics.
struct TearDown;

impl Drop for TearDown {
    fn drop(&mut self) {
        if let Some(mut sim) = sim_if::uninstall() {
            sim.cancel_all_callbacks();
        }
        executor::clear_ready_queue();
    }
}

impl Simulation {
    pub fn new(backend: impl SimIf + 'static) -> Self {
        Self {
            backend: Some(Box::new(backend)),
            time_limit_ns: None,
            final_time_ns: 0.0,
            wall_secs: 0.0,
        }
    }

    pub fn with_time_limit_ns(mut self, limit_ns: u64) -> Self {
        self.time_limit_ns = Some(limit_ns);
        self
    }

    /// Simulated time when the last run finished.
    pub fn final_time_ns(&self) -> f64 {
        self.final_time_ns
    }

    pub fn wall_secs(&self) -> f64 {
        self.wall_secs
    }

    /// Runs `test` until it completes, advancing simulated time whenever all
    /// tasks are suspended. Forked tasks still pending at the end are dropped.
    pub fn run<F>(&mut self, test: F) -> TbResult<()>
    where
        F: Future<Output = TbResult<()>> + Send + 'static,
    {
        let backend = self.backend.take().ok_or(TbError::NoSimulation)?;
        let limit_steps = match self.time_limit_ns {
            Some(ns) => Some(backend.get_sim_steps(ns as f64, "ns")?),
            None => None,
        };
        if sim_if::install(backend).is_some() {
            warn!("replaced a simulation that was still installed on this thread");
        }
        let _tear_down = TearDown;
        let start = time::Instant::now();

        let mut handle = Task::spawn(test, "test");
        let result = loop {
            executor::run_once();
            if let Some(result) = handle.try_result() {
                break result;
            }
            match sim_if::with_sim(|sim| sim.advance())? {
                Some(t) => {
                    if limit_steps.is_some_and(|limit| t > limit) {
                        break Err(TbError::TimeLimit {
                            limit_ns: self.time_limit_ns.unwrap_or_default(),
                        });
                    }
                }
                None => {
                    let time_ps = sim_if::with_sim(|sim| sim.get_sim_time_steps())?;
                    break Err(TbError::Stalled { time_ps });
                }
            }
        };

        self.final_time_ns = sim_if::sim_time_ns();
        self.wall_secs = start.elapsed().as_secs_f64();
        debug!(
            sim_ns = self.final_time_ns,
            wall_secs = self.wall_secs,
            "simulation finished"
        );
        result
    }
}

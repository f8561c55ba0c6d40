//! Deadline-bounded polling of device state.
//!
//! A poll issues one read per iteration and waits a number of clock cycles
//! between reads. The deadline is in simulated time and is only checked
//! between reads, so an in-flight transaction always completes.

use std::fmt::Debug;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TbResult;
use crate::signal::SimObject;
use crate::sim_if::sim_time_ns;
use crate::utils::clock_cycles;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub timeout_ns: u64,
    pub interval_cycles: u32,
}

impl PollConfig {
    pub const fn new(timeout_ns: u64, interval_cycles: u32) -> Self {
        Self {
            timeout_ns,
            interval_cycles,
        }
    }
}

/// Outcome of a poll. A timeout is a normal outcome, not an error.
#[derive(Clone, Debug, PartialEq)]
pub struct PollReport<T> {
    pub satisfied: bool,
    pub elapsed_ns: f64,
    pub polls: u32,
    /// Value of the last read.
    pub last: Option<T>,
}

impl<T> PollReport<T> {
    pub fn timed_out(&self) -> bool {
        !self.satisfied
    }
}

/// Reads with `read` until `done` accepts a value or `cfg.timeout_ns` of
/// simulated time has passed. At least one read is always made, and no
/// read starts after the deadline. Reads are at least one clock apart.
pub async fn poll_until<T, R, Fut, D>(
    what: &str,
    clk: SimObject,
    cfg: PollConfig,
    mut read: R,
    mut done: D,
) -> TbResult<PollReport<T>>
where
    T: Debug,
    R: FnMut() -> Fut,
    Fut: Future<Output = TbResult<T>>,
    D: FnMut(&T) -> bool,
{
    let start = sim_time_ns();
    let mut polls = 0;
    loop {
        let value = read().await?;
        polls += 1;
        let elapsed_ns = sim_time_ns() - start;
        if done(&value) {
            debug!(sim_ns = start + elapsed_ns, elapsed_ns, polls, "{what}: condition met");
            return Ok(PollReport {
                satisfied: true,
                elapsed_ns,
                polls,
                last: Some(value),
            });
        }
        if elapsed_ns < cfg.timeout_ns as f64 {
            clock_cycles(clk, cfg.interval_cycles.max(1)).await?;
        }
        let elapsed_ns = sim_time_ns() - start;
        if elapsed_ns >= cfg.timeout_ns as f64 {
            warn!(
                sim_ns = start + elapsed_ns,
                timeout_ns = cfg.timeout_ns,
                polls,
                last = ?value,
                "{what}: timed out"
            );
            return Ok(PollReport {
                satisfied: false,
                elapsed_ns,
                polls,
                last: Some(value),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Task;
    use crate::kernel::NativeSim;
    use crate::sim::Simulation;
    use crate::testbench::clock;
    use crate::value::LogicVec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn sim_with_clock() -> Simulation {
        let mut native = NativeSim::new();
        native.add_signal("tb.clk", LogicVec::from_u32(0, 1));
        Simulation::new(native)
    }

    #[test]
    fn stops_on_first_satisfying_read() {
        let report = Arc::new(Mutex::new(None));
        let out = report.clone();
        sim_with_clock()
            .run(async move {
                let clk = SimObject::from_name("tb.clk")?;
                Task::fork(clock(clk, 10, "ns"));
                let count = Arc::new(AtomicU32::new(0));
                let r = poll_until(
                    "counter",
                    clk,
                    PollConfig::new(10_000, 5),
                    || {
                        let count = count.clone();
                        async move { Ok(count.fetch_add(1, Ordering::SeqCst) + 1) }
                    },
                    |v| *v >= 3,
                )
                .await?;
                *out.lock().unwrap() = Some(r);
                Ok(())
            })
            .unwrap();
        let r = report.lock().unwrap().take().unwrap();
        assert!(r.satisfied);
        assert_eq!(r.polls, 3);
        assert_eq!(r.last, Some(3));
    }

    #[test]
    fn zero_interval_still_advances_time() {
        let report = Arc::new(Mutex::new(None));
        let out = report.clone();
        sim_with_clock()
            .run(async move {
                let clk = SimObject::from_name("tb.clk")?;
                Task::fork(clock(clk, 10, "ns"));
                let r = poll_until(
                    "never",
                    clk,
                    PollConfig::new(100, 0),
                    || async { Ok(0u8) },
                    |_| false,
                )
                .await?;
                *out.lock().unwrap() = Some(r);
                Ok(())
            })
            .unwrap();
        let r = report.lock().unwrap().take().unwrap();
        assert!(r.timed_out());
        assert!(r.polls >= 10 && r.polls <= 11, "polls = {}", r.polls);
    }

    #[test]
    fn timeout_is_reported_not_raised() {
        let report = Arc::new(Mutex::new(None));
        let out = report.clone();
        sim_with_clock()
            .run(async move {
                let clk = SimObject::from_name("tb.clk")?;
                Task::fork(clock(clk, 10, "ns"));
                let r = poll_until(
                    "never",
                    clk,
                    PollConfig::new(1_000, 10),
                    || async { Ok(0u8) },
                    |_| false,
                )
                .await?;
                *out.lock().unwrap() = Some(r);
                Ok(())
            })
            .unwrap();
        let r = report.lock().unwrap().take().unwrap();
        assert!(r.timed_out());
        assert!(r.elapsed_ns >= 1_000.0);
        assert!(r.polls >= 10 && r.polls <= 11, "polls = {}", r.polls);
    }
}

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;

use crate::error::{TbError, TbResult};
use crate::value::LogicVec;

thread_local! {
    static SIM_IF: RefCell<Option<Box<dyn SimIf>>> = RefCell::new(None);
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

/// Registration of a suspended trigger with the simulator.
///
/// The same `fired` flag may back several registrations (a trigger waiting on
/// any of a set of signals); only the first one to fire wakes the task, the
/// rest are dropped lazily as stale.
#[derive(Debug, Clone)]
pub struct TrigShared {
    waker: Waker,
    // If trigger is an edge, the simulator needs to know if it waits for a
    // rising or falling edge so it can keep non-matching waiters registered.
    edge_kind: EdgeKind,
    fired: Arc<AtomicBool>,
}

impl TrigShared {
    pub fn new(waker: Waker, edge_kind: EdgeKind, fired: Arc<AtomicBool>) -> Self {
        Self {
            waker,
            edge_kind,
            fired,
        }
    }

    pub fn edge_kind(&self) -> EdgeKind {
        self.edge_kind
    }

    pub fn is_stale(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Marks the trigger as fired and wakes its task, unless another
    /// registration of the same trigger got there first.
    pub fn fire(self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.waker.wake();
        }
    }
}

/// Interface between the testbench and a simulator backend.
pub trait SimIf {
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize>;
    fn get_full_name(&self, handle: usize) -> TbResult<String>;
    fn get_size(&self, handle: usize) -> TbResult<u32>;
    fn get_value(&self, handle: usize) -> TbResult<LogicVec>;
    fn set_value(&mut self, handle: usize, value: LogicVec) -> TbResult<()>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    /// Wake `trig` after `steps` simulation steps. Zero steps wakes it in the
    /// next ready phase without advancing time.
    fn register_timer(&mut self, steps: u64, trig: TrigShared);
    fn register_edge(&mut self, handle: usize, trig: TrigShared) -> TbResult<()>;
    /// Advances to the earliest pending timer batch and fires it. Returns the
    /// new time, or `None` when nothing is scheduled.
    fn advance(&mut self) -> Option<u64>;
    fn cancel_all_callbacks(&mut self);

    fn get_sim_time(&self, unit: &str) -> TbResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let precision = self.get_sim_precision();
        Ok(ldexp10(t, precision - time_scale(unit)?))
    }

    fn get_sim_steps(&self, time: f64, unit: &str) -> TbResult<u64> {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit)? - precision);
        if steps % 1.0 == 0.0 {
            Ok(steps as u64)
        } else {
            Err(TbError::TimeRounding {
                time,
                unit: unit.to_string(),
                precision,
            })
        }
    }
}

pub(crate) fn install(sim: Box<dyn SimIf>) -> Option<Box<dyn SimIf>> {
    SIM_IF.with(|s| s.borrow_mut().replace(sim))
}

pub(crate) fn uninstall() -> Option<Box<dyn SimIf>> {
    SIM_IF.with(|s| s.borrow_mut().take())
}

/// Runs `f` against the simulator installed on this thread.
///
/// Must not be nested: `f` may wake tasks but never re-enter the simulator.
pub fn with_sim<R>(f: impl FnOnce(&mut dyn SimIf) -> R) -> TbResult<R> {
    SIM_IF.with(|s| match s.borrow_mut().as_mut() {
        Some(sim) => Ok(f(sim.as_mut())),
        None => Err(TbError::NoSimulation),
    })
}

pub fn is_running() -> bool {
    SIM_IF.with(|s| s.borrow().is_some())
}

/// Current simulation time in ns, or 0 outside of a simulation. Meant for log fields.
pub fn sim_time_ns() -> f64 {
    with_sim(|s| s.get_sim_time("ns").unwrap_or(0.0)).unwrap_or(0.0)
}

pub fn time_scale(unit: &str) -> TbResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(TbError::UnknownUnit(unit.to_string())),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ldexp10_scales_both_ways() {
        assert_eq!(ldexp10(1.5, 3), 1500.0);
        assert_eq!(ldexp10(1500.0, -3), 1.5);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(matches!(time_scale("min"), Err(TbError::UnknownUnit(_))));
        assert_eq!(time_scale("us").unwrap(), -6);
    }

    #[test]
    fn with_sim_outside_simulation_fails() {
        assert!(matches!(with_sim(|s| s.get_sim_time_steps()), Err(TbError::NoSimulation)));
        assert_eq!(sim_time_ns(), 0.0);
    }
}

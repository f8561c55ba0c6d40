//! Event-driven simulator backend.
//!
//! [`NativeSim`] keeps four-state signal values, edge waiters per signal and a
//! time-ordered timer queue. Writes take effect immediately and wake matching
//! edge waiters; the woken tasks run in the next ready phase at the same time.

use intmap::IntMap;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::{TbError, TbResult};
use crate::sim_if::{EdgeKind, SimIf, TrigShared};
use crate::value::{Logic, LogicVec};

/// Simulation precision: 1 ps.
pub const PRECISION: i8 = -12;

struct SignalSlot {
    name: String,
    // scopes carry no value
    value: Option<LogicVec>,
}

pub struct NativeSim {
    time: u64,
    signals: Vec<SignalSlot>,
    names: HashMap<String, usize>,
    // key is signal handle as u64
    edges: IntMap<VecDeque<TrigShared>>,
    // key is absolute callback time
    timers: BTreeMap<u64, VecDeque<TrigShared>>,
}

impl Default for NativeSim {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSim {
    pub fn new() -> Self {
        Self {
            time: 0,
            signals: Vec::new(),
            names: HashMap::new(),
            edges: IntMap::new(),
            timers: BTreeMap::new(),
        }
    }

    pub fn add_scope(&mut self, name: &str) -> usize {
        self.push_slot(name, None, true)
    }

    /// Adds a signal reachable through its hierarchical name.
    pub fn add_signal(&mut self, name: &str, init: LogicVec) -> usize {
        self.push_slot(name, Some(init), true)
    }

    /// Adds a signal that exists but cannot be looked up by name, like a net
    /// the simulator was built without visibility into.
    pub fn add_hidden_signal(&mut self, name: &str, init: LogicVec) -> usize {
        self.push_slot(name, Some(init), false)
    }

    fn push_slot(&mut self, name: &str, value: Option<LogicVec>, visible: bool) -> usize {
        let handle = self.signals.len();
        self.signals.push(SignalSlot {
            name: name.to_string(),
            value,
        });
        if visible {
            self.names.insert(name.to_string(), handle);
        }
        handle
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.values().map(|q| q.len()).sum()
    }

    fn slot(&self, handle: usize) -> TbResult<&SignalSlot> {
        self.signals.get(handle).ok_or(TbError::BadHandle(handle))
    }

    fn value_ref(&self, handle: usize) -> TbResult<&LogicVec> {
        let slot = self.slot(handle)?;
        slot.value
            .as_ref()
            .ok_or_else(|| TbError::NotFound(format!("{} has no value", slot.name)))
    }

    fn react(&mut self, handle: usize, edge: EdgeKind) {
        let Some(mut waiters) = self.edges.remove(handle as u64) else {
            return;
        };
        let mut keep = VecDeque::new();
        let mut wake = VecDeque::new();
        for trig in waiters.drain(..) {
            if trig.is_stale() {
                continue;
            }
            if trig.edge_kind() == EdgeKind::Any || trig.edge_kind() == edge {
                wake.push_back(trig);
            } else {
                keep.push_back(trig);
            }
        }
        if !keep.is_empty() {
            self.edges.insert(handle as u64, keep);
        }
        for trig in wake {
            trig.fire();
        }
    }
}

fn edge_of(old: Logic, new: Logic) -> EdgeKind {
    match new {
        Logic::One if old != Logic::One => EdgeKind::Rising,
        Logic::Zero if old != Logic::Zero => EdgeKind::Falling,
        _ => EdgeKind::Any,
    }
}

impl SimIf for NativeSim {
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TbError::NotFound(name.to_string()))
    }

    fn get_full_name(&self, handle: usize) -> TbResult<String> {
        Ok(self.slot(handle)?.name.clone())
    }

    fn get_size(&self, handle: usize) -> TbResult<u32> {
        Ok(self.slot(handle)?.value.as_ref().map_or(0, |v| v.width()))
    }

    fn get_value(&self, handle: usize) -> TbResult<LogicVec> {
        self.value_ref(handle).cloned()
    }

    fn set_value(&mut self, handle: usize, value: LogicVec) -> TbResult<()> {
        let old = self.value_ref(handle)?;
        if old.width() != value.width() {
            return Err(TbError::WidthMismatch {
                name: self.signals[handle].name.clone(),
                expected: old.width(),
                got: value.width(),
            });
        }
        if *old == value {
            return Ok(());
        }
        // vectors report edges on their LSB, like posedge on a bus in Verilog
        let edge = edge_of(old.bit(0), value.bit(0));
        self.signals[handle].value = Some(value);
        self.react(handle, edge);
        Ok(())
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.time
    }

    fn get_sim_precision(&self) -> i8 {
        PRECISION
    }

    fn register_timer(&mut self, steps: u64, trig: TrigShared) {
        // Add current time to key since advance() hands back absolute time, not delta
        let abs_time = self.time + steps;
        self.timers.entry(abs_time).or_default().push_back(trig);
    }

    fn register_edge(&mut self, handle: usize, trig: TrigShared) -> TbResult<()> {
        self.value_ref(handle)?;
        if let Some(waiters) = self.edges.get_mut(handle as u64) {
            waiters.push_back(trig);
        } else {
            let mut waiters = VecDeque::new();
            waiters.push_back(trig);
            self.edges.insert(handle as u64, waiters);
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<u64> {
        let (time, batch) = self.timers.pop_first()?;
        self.time = time;
        for trig in batch {
            trig.fire();
        }
        Some(time)
    }

    fn cancel_all_callbacks(&mut self) {
        // TrigShared wakers are dropped with this context
        self.timers.clear();
        self.edges = IntMap::new();
    }
}

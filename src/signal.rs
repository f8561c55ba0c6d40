use crate::error::{TbError, TbResult};
use crate::sim_if::with_sim;
use crate::trigger::Trigger;
use crate::value::{Logic, LogicVec, Sampled};

/// Handle to a simulation object (a signal or a scope).
///
/// Handles are plain indices and only mean something inside the simulation
/// that created them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimObject {
    pub(crate) handle: usize,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn from_handle(handle: usize) -> Self {
        SimObject { handle }
    }

    pub fn from_name(full_name: &str) -> TbResult<Self> {
        let handle = with_sim(|sim| sim.get_handle_by_name(full_name))??;
        Ok(SimObject { handle })
    }

    pub fn name(&self) -> String {
        with_sim(|sim| sim.get_full_name(self.handle))
            .and_then(|r| r)
            .unwrap_or_else(|_| format!("<handle {}>", self.handle))
    }

    pub fn size(&self) -> TbResult<u32> {
        with_sim(|sim| sim.get_size(self.handle))?
    }

    pub fn get_child(&self, name: &str) -> TbResult<Self> {
        let mut child_name = with_sim(|sim| sim.get_full_name(self.handle))??;
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    pub fn value(&self) -> TbResult<LogicVec> {
        with_sim(|sim| sim.get_value(self.handle))?
    }

    /// Current value; an unreadable object reads as a single X.
    pub fn value_or_x(&self) -> LogicVec {
        self.value().unwrap_or_else(|_| LogicVec::unknown(1))
    }

    pub fn logic(&self) -> Logic {
        self.value_or_x().bit(0)
    }

    /// Numeric value with X/Z read as 0.
    pub fn u32(&self) -> u32 {
        self.value_or_x().to_u32_lossy()
    }

    pub fn sampled(&self) -> Sampled {
        self.value_or_x().sample()
    }

    pub fn bin(&self) -> String {
        self.value_or_x().to_string()
    }

    pub fn set(&self, val: u32) -> TbResult<()> {
        let width = self.size()?;
        self.set_value(LogicVec::from_u32(val, width))
    }

    pub fn set_bool(&self, val: bool) -> TbResult<()> {
        self.set(val as u32)
    }

    pub fn set_value(&self, val: LogicVec) -> TbResult<()> {
        with_sim(|sim| sim.set_value(self.handle, val))?
    }

    pub fn set_bin(&self, val: &str) -> TbResult<()> {
        let parsed: LogicVec = val.parse()?;
        let width = self.size()?;
        if parsed.width() != width {
            return Err(TbError::WidthMismatch {
                name: self.name(),
                expected: width,
                got: parsed.width(),
            });
        }
        self.set_value(parsed)
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }

    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }

    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

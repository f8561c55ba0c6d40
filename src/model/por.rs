use crate::por::PorState;

/// Cycles spent in each timed POR state.
pub(crate) const WAIT_SUPPLY_CYCLES: u32 = 48;
pub(crate) const ANALOG_ISO_CYCLES: u32 = 24;
pub(crate) const DIGITAL_PULSE_CYCLES: u32 = 24;
pub(crate) const ANALOG_PULSE_CYCLES: u32 = 24;
pub(crate) const RELEASE_ISO_CYCLES: u32 = 12;

/// Power-on-reset controller. Reset outputs are active low.
#[derive(Debug)]
pub(crate) struct PorFsm {
    state: PorState,
    count: u32,
}

impl PorFsm {
    pub fn new() -> Self {
        Self {
            state: PorState::Reset,
            count: 0,
        }
    }

    pub fn state(&self) -> PorState {
        self.state
    }

    /// External reset, asynchronous.
    pub fn reset(&mut self) {
        self.enter(PorState::Reset);
    }

    fn enter(&mut self, state: PorState) {
        self.state = state;
        self.count = 0;
    }

    /// One clock with reset released.
    pub fn step(&mut self, ena: bool, power_good: bool) {
        use PorState::*;

        match self.state {
            Reset => {
                if ena {
                    self.enter(WaitSupply);
                }
            }
            Error => {
                if power_good {
                    self.enter(Reset);
                }
            }
            _ if !power_good => {
                if self.state != WaitSupply {
                    self.enter(Error);
                } else {
                    self.count = 0;
                }
            }
            Ready => {}
            timed => {
                self.count += 1;
                let (limit, next) = match timed {
                    WaitSupply => (WAIT_SUPPLY_CYCLES, AnalogIso),
                    AnalogIso => (ANALOG_ISO_CYCLES, DigitalPulse),
                    DigitalPulse => (DIGITAL_PULSE_CYCLES, AnalogPulse),
                    AnalogPulse => (ANALOG_PULSE_CYCLES, ReleaseIso),
                    _ => (RELEASE_ISO_CYCLES, Ready),
                };
                if self.count >= limit {
                    self.enter(next);
                }
            }
        }
    }

    pub fn digital_reset_n(&self) -> bool {
        matches!(
            self.state,
            PorState::AnalogPulse | PorState::ReleaseIso | PorState::Ready
        )
    }

    pub fn analog_reset_n(&self) -> bool {
        matches!(self.state, PorState::ReleaseIso | PorState::Ready)
    }

    pub fn analog_iso_n(&self) -> bool {
        self.state == PorState::Ready
    }

    pub fn complete(&self) -> bool {
        self.state == PorState::Ready
    }

    pub fn active(&self) -> bool {
        !matches!(self.state, PorState::Ready | PorState::Error)
    }
}

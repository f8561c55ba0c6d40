//! Register-file I2C slave, advanced one bus event at a time.

/// Register side of the slave.
pub(crate) trait RegisterAccess {
    fn read_reg(&mut self, addr: u8) -> u8;
    fn write_reg(&mut self, addr: u8, value: u8);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Address,
    Register,
    WriteData,
    /// Slave holds SDA low for the ACK bit, then continues with the phase.
    Ack(AfterAck),
    Transmit,
    HostAck,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AfterAck {
    Register,
    WriteData,
    Transmit,
}

#[derive(Debug)]
pub(crate) struct I2cSlave {
    addr: u8,
    phase: Phase,
    shift: u8,
    bits: u8,
    pointer: u8,
    tx_byte: u8,
    host_acked: bool,
    pull_low: bool,
}

impl I2cSlave {
    pub fn new(addr: u8) -> Self {
        Self {
            addr,
            phase: Phase::Idle,
            shift: 0,
            bits: 0,
            pointer: 0,
            tx_byte: 0,
            host_acked: false,
            pull_low: false,
        }
    }

    /// Whether the slave pulls SDA low right now.
    pub fn pulls_low(&self) -> bool {
        self.pull_low
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.pull_low = false;
        self.pointer = 0;
    }

    fn expect_byte(&mut self, phase: Phase) {
        self.phase = phase;
        self.shift = 0;
        self.bits = 0;
    }

    /// START and repeated START.
    pub fn start(&mut self) {
        self.pull_low = false;
        self.expect_byte(Phase::Address);
    }

    pub fn stop(&mut self) {
        self.pull_low = false;
        self.phase = Phase::Idle;
    }

    pub fn scl_rise(&mut self, sda: bool) {
        match self.phase {
            Phase::Address | Phase::Register | Phase::WriteData if self.bits < 8 => {
                self.shift = (self.shift << 1) | sda as u8;
                self.bits += 1;
            }
            Phase::HostAck => self.host_acked = !sda,
            _ => {}
        }
    }

    pub fn scl_fall(&mut self, regs: &mut impl RegisterAccess) {
        match self.phase {
            Phase::Address if self.bits == 8 => {
                if self.shift >> 1 == self.addr {
                    let next = if self.shift & 1 == 1 {
                        AfterAck::Transmit
                    } else {
                        AfterAck::Register
                    };
                    self.ack(next);
                } else {
                    self.stop();
                }
            }
            Phase::Register if self.bits == 8 => {
                self.pointer = self.shift;
                self.ack(AfterAck::WriteData);
            }
            Phase::WriteData if self.bits == 8 => {
                regs.write_reg(self.pointer, self.shift);
                self.pointer = self.pointer.wrapping_add(1);
                self.ack(AfterAck::WriteData);
            }
            Phase::Ack(next) => {
                self.pull_low = false;
                match next {
                    AfterAck::Register => self.expect_byte(Phase::Register),
                    AfterAck::WriteData => self.expect_byte(Phase::WriteData),
                    AfterAck::Transmit => self.load_byte(regs),
                }
            }
            Phase::Transmit => {
                self.bits += 1;
                if self.bits == 8 {
                    self.pull_low = false;
                    self.phase = Phase::HostAck;
                } else {
                    self.drive_bit();
                }
            }
            Phase::HostAck => {
                if self.host_acked {
                    self.load_byte(regs);
                } else {
                    self.stop();
                }
            }
            _ => {}
        }
    }

    fn ack(&mut self, next: AfterAck) {
        self.pull_low = true;
        self.phase = Phase::Ack(next);
    }

    fn load_byte(&mut self, regs: &mut impl RegisterAccess) {
        self.tx_byte = regs.read_reg(self.pointer);
        self.pointer = self.pointer.wrapping_add(1);
        self.bits = 0;
        self.phase = Phase::Transmit;
        self.drive_bit();
    }

    fn drive_bit(&mut self) {
        let bit = (self.tx_byte >> (7 - self.bits)) & 1;
        self.pull_low = bit == 0;
    }
}

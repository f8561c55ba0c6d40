//! Register reads and writes composed from bus primitives.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::TbResult;
use crate::i2c::I2cMaster;
use crate::regmap::{Register, SLAVE_ADDR};
use crate::sim_if::sim_time_ns;

/// ACK outcome of each byte of a register write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteAck {
    pub address: bool,
    pub register: bool,
    pub data: bool,
}

impl WriteAck {
    pub fn all(&self) -> bool {
        self.address && self.register && self.data
    }

    pub fn as_array(&self) -> [bool; 3] {
        [self.address, self.register, self.data]
    }
}

/// Register access through a 7-bit addressed slave.
#[derive(Clone, Debug)]
pub struct RegisterBus {
    master: I2cMaster,
    slave_addr: u8,
}

impl RegisterBus {
    pub fn new(master: I2cMaster) -> Self {
        Self {
            master,
            slave_addr: SLAVE_ADDR,
        }
    }

    pub fn with_slave_addr(master: I2cMaster, slave_addr: u8) -> Self {
        Self {
            master,
            slave_addr: slave_addr & 0x7F,
        }
    }

    pub fn slave_addr(&self) -> u8 {
        self.slave_addr
    }

    pub fn master(&self) -> &I2cMaster {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut I2cMaster {
        &mut self.master
    }

    /// Writes one register. NACKs are returned, never raised, and the STOP is
    /// always sent.
    pub async fn write_register(&self, reg: u8, data: u8) -> TbResult<WriteAck> {
        self.write_register_to(self.slave_addr, reg, data).await
    }

    /// Like [`RegisterBus::write_register`] but addressed to `addr7`.
    pub async fn write_register_to(&self, addr7: u8, reg: u8, data: u8) -> TbResult<WriteAck> {
        let m = &self.master;
        m.start_condition().await?;
        let address = m.write_byte(addr7 << 1).await?;
        let register = m.write_byte(reg).await?;
        let data_ack = m.write_byte(data).await?;
        m.stop_condition().await?;

        let acks = WriteAck {
            address,
            register,
            data: data_ack,
        };
        if acks.all() {
            debug!(sim_ns = sim_time_ns(), "register write 0x{:02X} <- 0x{:02X}", reg, data);
        } else {
            warn!(
                sim_ns = sim_time_ns(),
                acks = ?acks.as_array(),
                "register write to slave 0x{:02X} reg 0x{:02X} not acknowledged",
                addr7,
                reg
            );
        }
        Ok(acks)
    }

    /// Reads one register using a repeated START, NACKing the single data byte.
    pub async fn read_register(&self, reg: u8) -> TbResult<u8> {
        let m = &self.master;
        m.start_condition().await?;
        let addr_ack = m.write_byte(self.slave_addr << 1).await?;
        let reg_ack = m.write_byte(reg).await?;
        m.start_condition().await?;
        let read_ack = m.write_byte((self.slave_addr << 1) | 1).await?;
        let data = m.read_byte(false).await?;
        m.stop_condition().await?;

        if !(addr_ack && reg_ack && read_ack) {
            warn!(
                sim_ns = sim_time_ns(),
                acks = ?[addr_ack, reg_ack, read_ack],
                "register read of 0x{:02X} not acknowledged",
                reg
            );
        }
        debug!(sim_ns = sim_time_ns(), "register read 0x{:02X} -> 0x{:02X}", reg, data);
        Ok(data)
    }

    pub async fn write(&self, reg: Register, data: u8) -> TbResult<WriteAck> {
        self.write_register(reg.addr(), data).await
    }

    pub async fn read(&self, reg: Register) -> TbResult<u8> {
        self.read_register(reg.addr()).await
    }

    /// Reads every defined register in ascending address order. Each read is
    /// its own transaction.
    pub async fn read_all_registers(&self) -> TbResult<BTreeMap<u8, u8>> {
        let mut values = BTreeMap::new();
        for reg in Register::ALL {
            values.insert(reg.addr(), self.read(reg).await?);
        }
        Ok(values)
    }

    /// Issues just the address phase to `addr7` and returns its ACK.
    pub async fn probe_address(&self, addr7: u8) -> TbResult<bool> {
        let m = &self.master;
        m.start_condition().await?;
        let ack = m.write_byte(addr7 << 1).await?;
        m.stop_condition().await?;
        Ok(ack)
    }
}

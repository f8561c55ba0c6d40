//! Bit-banged I2C master.
//!
//! Every pin change is followed by an explicit simulated-time hold, so the
//! ordering of SCL and SDA transitions is fixed by the timing set. The master
//! never decides whether an ACK was required; it only reports what it saw.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{TbError, TbResult};
use crate::signal::SimObject;
use crate::sim_if::sim_time_ns;
use crate::trigger::Trigger;
use crate::value::Logic;

/// Smallest SDA setup before an SCL rise the device is specified for.
pub const MIN_DATA_SETUP_NS: u64 = 100;

/// Bus timing, all values in ns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct I2cTiming {
    pub scl_period_ns: u64,
    pub scl_high_ns: u64,
    pub scl_low_ns: u64,
    pub start_setup_ns: u64,
    pub start_hold_ns: u64,
    pub stop_setup_ns: u64,
    pub stop_hold_ns: u64,
    /// SDA stable before the SCL rise that samples it.
    pub data_setup_ns: u64,
    /// Delay between releasing SDA and clocking the ACK bit.
    pub ack_release_ns: u64,
}

impl Default for I2cTiming {
    fn default() -> Self {
        Self {
            scl_period_ns: 2500,
            scl_high_ns: 1000,
            scl_low_ns: 1500,
            start_setup_ns: 600,
            start_hold_ns: 600,
            stop_setup_ns: 600,
            stop_hold_ns: 600,
            data_setup_ns: 1500,
            ack_release_ns: 750,
        }
    }
}

impl I2cTiming {
    /// Timing for a bus rate in Hz, scaled from the default 400 kHz set:
    /// 40% high, 60% low, START/STOP intervals at 24% of the period.
    pub fn for_frequency(hz: u32) -> TbResult<Self> {
        if hz == 0 {
            return Err(TbError::InvalidTiming("bus frequency of 0 Hz".to_string()));
        }
        let period = (1_000_000_000 / hz as u64).max(1);
        let high = period * 2 / 5;
        let low = period - high;
        let start_stop = (period * 6 / 25).max(MIN_DATA_SETUP_NS);
        let timing = Self {
            scl_period_ns: period,
            scl_high_ns: high,
            scl_low_ns: low,
            start_setup_ns: start_stop,
            start_hold_ns: start_stop,
            stop_setup_ns: start_stop,
            stop_hold_ns: start_stop,
            data_setup_ns: low.max(MIN_DATA_SETUP_NS),
            ack_release_ns: (low / 2).max(1),
        };
        timing.validate()?;
        Ok(timing)
    }

    /// Timing with every margin at its documented minimum.
    pub fn minimum_margins() -> Self {
        Self {
            data_setup_ns: MIN_DATA_SETUP_NS,
            start_hold_ns: 600,
            stop_setup_ns: 600,
            ..Self::default()
        }
    }

    pub fn frequency_hz(&self) -> f64 {
        1e9 / self.scl_period_ns as f64
    }

    pub fn validate(&self) -> TbResult<()> {
        let named = [
            ("scl_period_ns", self.scl_period_ns),
            ("scl_high_ns", self.scl_high_ns),
            ("scl_low_ns", self.scl_low_ns),
            ("start_setup_ns", self.start_setup_ns),
            ("start_hold_ns", self.start_hold_ns),
            ("stop_setup_ns", self.stop_setup_ns),
            ("stop_hold_ns", self.stop_hold_ns),
            ("data_setup_ns", self.data_setup_ns),
            ("ack_release_ns", self.ack_release_ns),
        ];
        if let Some((name, _)) = named.iter().find(|(_, v)| *v == 0) {
            return Err(TbError::InvalidTiming(format!("{name} must not be 0")));
        }
        if self.data_setup_ns < MIN_DATA_SETUP_NS {
            return Err(TbError::InvalidTiming(format!(
                "data setup of {} ns is below the {} ns minimum",
                self.data_setup_ns, MIN_DATA_SETUP_NS
            )));
        }
        if self.scl_high_ns + self.scl_low_ns > self.scl_period_ns {
            return Err(TbError::InvalidTiming(format!(
                "high {} ns + low {} ns exceed the period of {} ns",
                self.scl_high_ns, self.scl_low_ns, self.scl_period_ns
            )));
        }
        Ok(())
    }
}

/// The four bus pins as seen from the master.
#[derive(Clone, Copy, Debug)]
pub struct I2cPins {
    pub scl: SimObject,
    pub sda_out: SimObject,
    pub sda_oe: SimObject,
    /// Resolved SDA wire value.
    pub sda_in: SimObject,
}

#[derive(Clone, Debug)]
pub struct I2cMaster {
    pins: I2cPins,
    timing: I2cTiming,
}

async fn hold(ns: u64) -> TbResult<()> {
    Trigger::timer_ns(ns).await
}

impl I2cMaster {
    pub fn new(pins: I2cPins) -> Self {
        Self {
            pins,
            timing: I2cTiming::default(),
        }
    }

    pub fn with_timing(pins: I2cPins, timing: I2cTiming) -> TbResult<Self> {
        timing.validate()?;
        Ok(Self { pins, timing })
    }

    pub fn timing(&self) -> &I2cTiming {
        &self.timing
    }

    pub fn set_timing(&mut self, timing: I2cTiming) -> TbResult<()> {
        timing.validate()?;
        self.timing = timing;
        Ok(())
    }

    pub fn pins(&self) -> &I2cPins {
        &self.pins
    }

    fn set_scl(&self, level: u32) -> TbResult<()> {
        self.pins.scl.set(level)
    }

    fn drive_sda(&self, level: u32) -> TbResult<()> {
        self.pins.sda_out.set(level)?;
        self.pins.sda_oe.set(1)
    }

    fn release_sda(&self) -> TbResult<()> {
        self.pins.sda_oe.set(0)?;
        self.pins.sda_out.set(1)
    }

    fn sample_sda(&self) -> TbResult<Logic> {
        Ok(self.pins.sda_in.value()?.bit(0))
    }

    /// START, or repeated START when the bus is mid-transaction.
    pub async fn start_condition(&self) -> TbResult<()> {
        let t = &self.timing;
        self.drive_sda(1)?;
        if self.pins.scl.value()?.bit(0) != Logic::One {
            // repeated START: SDA must be high before SCL rises
            hold(t.data_setup_ns).await?;
            self.set_scl(1)?;
        }
        hold(t.start_setup_ns).await?;
        self.drive_sda(0)?;
        hold(t.start_hold_ns).await?;
        self.set_scl(0)?;
        hold(t.scl_low_ns).await?;
        trace!(sim_ns = sim_time_ns(), "i2c START");
        Ok(())
    }

    pub async fn stop_condition(&self) -> TbResult<()> {
        let t = &self.timing;
        self.set_scl(0)?;
        self.drive_sda(0)?;
        hold(t.scl_low_ns).await?;
        self.set_scl(1)?;
        hold(t.stop_setup_ns).await?;
        self.drive_sda(1)?;
        hold(t.stop_hold_ns).await?;
        self.release_sda()?;
        trace!(sim_ns = sim_time_ns(), "i2c STOP");
        Ok(())
    }

    /// Clocks out `byte` MSB first and returns whether the receiver ACKed.
    /// SDA is released on the SCL fall after the last bit.
    /// Only a resolved `0` counts as ACK; a pulled-up, floating or unknown
    /// line is a NACK.
    pub async fn write_byte(&self, byte: u8) -> TbResult<bool> {
        let t = &self.timing;
        for i in (0..8).rev() {
            self.drive_sda(((byte >> i) & 1) as u32)?;
            hold(t.data_setup_ns).await?;
            self.set_scl(1)?;
            hold(t.scl_high_ns).await?;
            self.set_scl(0)?;
            if i > 0 {
                hold(t.scl_low_ns).await?;
            }
        }

        // the receiver may drive ACK as soon as SCL falls after the last bit
        self.release_sda()?;
        hold(t.ack_release_ns).await?;
        self.set_scl(1)?;
        hold(t.scl_high_ns).await?;
        let ack = self.sample_sda()? == Logic::Zero;
        self.set_scl(0)?;
        hold(t.scl_low_ns).await?;

        trace!(sim_ns = sim_time_ns(), ack, "i2c write 0x{:02X}", byte);
        Ok(ack)
    }

    /// Clocks in one byte MSB first, then sends ACK (`send_ack`) or NACK.
    pub async fn read_byte(&self, send_ack: bool) -> TbResult<u8> {
        let t = &self.timing;
        let mut byte = 0u8;
        self.release_sda()?;
        for _ in 0..8 {
            self.set_scl(1)?;
            hold(t.scl_high_ns).await?;
            let bit = match self.sample_sda()? {
                Logic::Zero => 0,
                _ => 1,
            };
            byte = (byte << 1) | bit;
            self.set_scl(0)?;
            hold(t.scl_low_ns).await?;
        }

        self.drive_sda(if send_ack { 0 } else { 1 })?;
        hold(t.scl_low_ns).await?;
        self.set_scl(1)?;
        hold(t.scl_high_ns).await?;
        self.set_scl(0)?;
        self.release_sda()?;
        hold(t.scl_low_ns).await?;

        trace!(sim_ns = sim_time_ns(), send_ack, "i2c read 0x{:02X}", byte);
        Ok(byte)
    }
}

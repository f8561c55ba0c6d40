//! Behavioral model of the SerDes PHY, used as the device the testbench drives.
//!
//! [`PhyModel::build`] creates the pins in a [`NativeSim`] before the run;
//! [`PhyModel::spawn`] forks the model's processes once the simulation runs.
//! All processes share one [`Device`] state.

mod datapath;
mod i2c_slave;
mod por;

use tracing::error;

use crate::error::TbResult;
use crate::executor::Task;
use crate::kernel::NativeSim;
use crate::regmap::{Register, SLAVE_ADDR};
use crate::shared::TbObj;
use crate::signal::SimObject;
use crate::trigger::Trigger;
use crate::value::{Logic, LogicVec};

use self::datapath::{ClockInputs, Datapath};
use self::i2c_slave::{I2cSlave, RegisterAccess};
use self::por::PorFsm;

pub use self::datapath::{FIFO_ALMOST_FULL, FIFO_DEPTH, IDLE_WORD};

/// Scope all PHY pins live under.
pub const SCOPE: &str = "phy";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhyModelConfig {
    /// Whether the POR internals can be looked up by name.
    pub expose_internals: bool,
    /// Whether SDA has a pull-up. Without one a released line floats.
    pub sda_pullup: bool,
    pub slave_addr: u8,
    /// Clock cycles from TX serializer to RX in loopback.
    pub loopback_latency: u32,
}

impl Default for PhyModelConfig {
    fn default() -> Self {
        Self {
            expose_internals: true,
            sda_pullup: true,
            slave_addr: SLAVE_ADDR,
            loopback_latency: 4,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Pins {
    clk: SimObject,
    rst_n: SimObject,
    ena: SimObject,
    test_mode: SimObject,
    lpbk_en: SimObject,
    tx_data: SimObject,
    tx_valid: SimObject,
    rx_data: SimObject,
    rx_valid: SimObject,
    scl: SimObject,
    sda_out: SimObject,
    sda_oe: SimObject,
    sda_internal: SimObject,
    sda_slave_low: SimObject,
    dvdd_ok: SimObject,
    avdd_ok: SimObject,
    por_state: SimObject,
    por_active: SimObject,
    por_complete: SimObject,
    power_good: SimObject,
    analog_iso_n: SimObject,
    digital_reset_n: SimObject,
    analog_reset_n: SimObject,
}

/// Register file plus the logic behind it.
struct Core {
    regs: [u8; 8],
    dp: Datapath,
}

impl Core {
    fn reset(&mut self) {
        for reg in Register::ALL {
            self.regs[reg.addr() as usize] = reg.reset_value();
        }
        self.dp.reset();
    }
}

impl RegisterAccess for Core {
    fn read_reg(&mut self, addr: u8) -> u8 {
        match Register::from_addr(addr) {
            Some(Register::Status) => {
                let value = self.dp.status_bits() | self.dp.sticky;
                self.dp.sticky = 0;
                value
            }
            Some(reg) => self.regs[reg.addr() as usize],
            None => 0x00,
        }
    }

    fn write_reg(&mut self, addr: u8, value: u8) {
        if let Some(reg) = Register::from_addr(addr) {
            if !reg.is_read_only() {
                self.regs[addr as usize] = value & reg.write_mask();
            }
        }
    }
}

struct Device {
    slave: I2cSlave,
    core: Core,
    por: PorFsm,
    // rx_data stays undriven until the first external reset
    rx_initialized: bool,
}

impl Device {
    fn new(cfg: &PhyModelConfig) -> Self {
        let mut core = Core {
            regs: [0; 8],
            dp: Datapath::new(cfg.loopback_latency),
        };
        core.reset();
        Self {
            slave: I2cSlave::new(cfg.slave_addr),
            core,
            por: PorFsm::new(),
            rx_initialized: false,
        }
    }

    fn external_reset(&mut self) {
        self.por.reset();
        self.core.reset();
        self.slave.reset();
        self.rx_initialized = true;
    }

    fn clock(&mut self, in_reset: bool, ena: bool, power_good: bool, inputs: ClockInputs) {
        if in_reset {
            self.external_reset();
            return;
        }
        self.por.step(ena, power_good);
        if self.por.digital_reset_n() {
            self.core.dp.step(&mut self.core.regs, inputs);
        } else {
            self.core.reset();
            self.slave.reset();
        }
    }
}

/// Handle to a built model.
#[derive(Clone, Copy, Debug)]
pub struct PhyModel {
    pins: Pins,
    cfg: PhyModelConfig,
}

fn bit(v: bool) -> LogicVec {
    LogicVec::from_logic(Logic::from_bool(v))
}

fn resolve_sda(oe: Logic, out: Logic, slave_low: bool, pullup: bool) -> Logic {
    let master = match oe {
        Logic::One => Some(if out.is_binary() { out } else { Logic::X }),
        Logic::Zero => None,
        _ => Some(Logic::X),
    };
    match (master, slave_low) {
        (Some(Logic::Zero), _) => Logic::Zero,
        (Some(_), true) => Logic::X,
        (Some(level), false) => level,
        (None, true) => Logic::Zero,
        (None, false) if pullup => Logic::One,
        (None, false) => Logic::Z,
    }
}

impl PhyModel {
    pub fn build(sim: &mut NativeSim, cfg: PhyModelConfig) -> Self {
        sim.add_scope(SCOPE);
        let mut pin = |name: &str, init: LogicVec| {
            SimObject::from_handle(sim.add_signal(&format!("{SCOPE}.{name}"), init))
        };
        let clk = pin("clk", LogicVec::from_u32(0, 1));
        let rst_n = pin("rst_n", LogicVec::unknown(1));
        let ena = pin("ena", LogicVec::unknown(1));
        let test_mode = pin("test_mode", LogicVec::unknown(1));
        let lpbk_en = pin("lpbk_en", LogicVec::unknown(1));
        let tx_data = pin("tx_data", LogicVec::unknown(4));
        let tx_valid = pin("tx_valid", LogicVec::unknown(1));
        let rx_data = pin("rx_data", LogicVec::unknown(4));
        let rx_valid = pin("rx_valid", LogicVec::unknown(1));
        let scl = pin("scl", LogicVec::from_u32(1, 1));
        let sda_out = pin("sda_out", LogicVec::from_u32(1, 1));
        let sda_oe = pin("sda_oe", LogicVec::from_u32(0, 1));
        let sda_internal = pin("sda_internal", LogicVec::unknown(1));
        let dvdd_ok = pin("dvdd_ok", LogicVec::from_u32(1, 1));
        let avdd_ok = pin("avdd_ok", LogicVec::from_u32(1, 1));

        let mut internal = |name: &str, init: LogicVec| {
            let full = format!("{SCOPE}.{name}");
            let handle = if cfg.expose_internals {
                sim.add_signal(&full, init)
            } else {
                sim.add_hidden_signal(&full, init)
            };
            SimObject::from_handle(handle)
        };
        let por_state = internal("por_state", LogicVec::unknown(3));
        let por_active = internal("por_active", LogicVec::unknown(1));
        let por_complete = internal("por_complete", LogicVec::unknown(1));
        let power_good = internal("power_good", LogicVec::unknown(1));
        let analog_iso_n = internal("analog_iso_n", LogicVec::unknown(1));
        let digital_reset_n = internal("digital_reset_n", LogicVec::unknown(1));
        let analog_reset_n = internal("analog_reset_n", LogicVec::unknown(1));

        let sda_slave_low = SimObject::from_handle(
            sim.add_hidden_signal(&format!("{SCOPE}.i2c_slave.sda_low"), LogicVec::from_u32(0, 1)),
        );

        PhyModel {
            pins: Pins {
                clk,
                rst_n,
                ena,
                test_mode,
                lpbk_en,
                tx_data,
                tx_valid,
                rx_data,
                rx_valid,
                scl,
                sda_out,
                sda_oe,
                sda_internal,
                sda_slave_low,
                dvdd_ok,
                avdd_ok,
                por_state,
                por_active,
                por_complete,
                power_good,
                analog_iso_n,
                digital_reset_n,
                analog_reset_n,
            },
            cfg,
        }
    }

    pub fn config(&self) -> &PhyModelConfig {
        &self.cfg
    }

    /// Forks the model's processes. Must run inside the simulation, before
    /// the testbench starts waiting on the clock.
    pub fn spawn(&self) -> TbResult<()> {
        let device = TbObj::new(Device::new(&self.cfg));
        let pins = self.pins;
        let pullup = self.cfg.sda_pullup;

        fork_process("sda_bus", sda_bus(pins, pullup));
        fork_process("i2c_slave", i2c_slave(pins, device.clone()));
        fork_process("clocked", clocked(pins, device.clone()));
        fork_process("async_reset", async_reset(pins, device));
        Ok(())
    }
}

fn fork_process(
    name: &'static str,
    process: impl std::future::Future<Output = TbResult<()>> + Send + 'static,
) {
    Task::spawn(
        async move {
            let result = process.await;
            if let Err(e) = &result {
                error!(process = name, "device model process failed: {}", e);
            }
            result
        },
        name,
    );
}

async fn sda_bus(pins: Pins, pullup: bool) -> TbResult<()> {
    loop {
        let level = resolve_sda(
            pins.sda_oe.logic(),
            pins.sda_out.logic(),
            pins.sda_slave_low.logic() == Logic::One,
            pullup,
        );
        pins.sda_internal.set_value(LogicVec::from_logic(level))?;
        Trigger::any_edge(&[pins.sda_out, pins.sda_oe, pins.sda_slave_low]).await?;
    }
}

async fn i2c_slave(pins: Pins, device: TbObj<Device>) -> TbResult<()> {
    let mut prev_scl = pins.scl.logic();
    let mut prev_sda = pins.sda_internal.logic();
    loop {
        Trigger::any_edge(&[pins.scl, pins.sda_internal]).await?;
        let scl = pins.scl.logic();
        let sda = pins.sda_internal.logic();
        let enabled = pins.ena.logic() == Logic::One;

        let pull_low = device.with_mut(|d| {
            if !enabled || !d.por.digital_reset_n() {
                d.slave.reset();
                return false;
            }
            if scl != prev_scl {
                match scl {
                    Logic::One => d.slave.scl_rise(sda != Logic::Zero),
                    Logic::Zero => d.slave.scl_fall(&mut d.core),
                    _ => {}
                }
            } else if scl == Logic::One {
                match (prev_sda, sda) {
                    (Logic::One, Logic::Zero) => d.slave.start(),
                    (Logic::Zero, Logic::One) => d.slave.stop(),
                    _ => {}
                }
            }
            d.slave.pulls_low()
        });
        pins.sda_slave_low.set_value(bit(pull_low))?;
        prev_scl = scl;
        prev_sda = sda;
    }
}

fn drive_outputs(pins: &Pins, device: &TbObj<Device>) -> TbResult<()> {
    let (por, state, rx) = device.with_mut(|d| {
        let rx = d.rx_initialized.then(|| d.core.dp.rx_output());
        (
            [
                d.por.active(),
                d.por.complete(),
                d.por.analog_iso_n(),
                d.por.digital_reset_n(),
                d.por.analog_reset_n(),
            ],
            d.por.state().code(),
            rx,
        )
    });
    pins.por_state.set(state as u32)?;
    pins.por_active.set_value(bit(por[0]))?;
    pins.por_complete.set_value(bit(por[1]))?;
    pins.analog_iso_n.set_value(bit(por[2]))?;
    pins.digital_reset_n.set_value(bit(por[3]))?;
    pins.analog_reset_n.set_value(bit(por[4]))?;
    if let Some(rx) = rx {
        pins.rx_data.set(rx.data as u32)?;
        pins.rx_valid.set_value(bit(rx.valid))?;
    }
    Ok(())
}

async fn clocked(pins: Pins, device: TbObj<Device>) -> TbResult<()> {
    loop {
        pins.clk.rising_edge().await?;
        let power_good = pins.dvdd_ok.logic() == Logic::One && pins.avdd_ok.logic() == Logic::One;
        pins.power_good.set_value(bit(power_good))?;
        let in_reset = pins.rst_n.logic() != Logic::One;
        let ena = pins.ena.logic() == Logic::One;
        let inputs = ClockInputs {
            tx_data: pins.tx_data.sampled().value as u8,
            tx_valid: pins.tx_valid.logic() == Logic::One,
            lpbk_en: pins.lpbk_en.logic() == Logic::One,
            test_mode: pins.test_mode.logic() == Logic::One,
        };
        device.with_mut(|d| d.clock(in_reset, ena, power_good, inputs));
        drive_outputs(&pins, &device)?;
    }
}

async fn async_reset(pins: Pins, device: TbObj<Device>) -> TbResult<()> {
    loop {
        pins.rst_n.falling_edge().await?;
        device.with_mut(|d| d.external_reset());
        drive_outputs(&pins, &device)?;
    }
}

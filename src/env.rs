//! Test environment: DUT pin bindings, the assembled driver stack and the
//! data helpers scenarios share.

use std::future::Future;

use tracing::{debug, info};

use crate::config::TbConfig;
use crate::error::TbResult;
use crate::executor::Task;
use crate::i2c::{I2cMaster, I2cPins, I2cTiming};
use crate::kernel::NativeSim;
use crate::model::{PhyModel, PhyModelConfig, SCOPE};
use crate::phy::PhyController;
use crate::por::{PorReport, PorSequencer};
use crate::signal::SimObject;
use crate::sim::Simulation;
use crate::testbench::{clock, Monitor};
use crate::transaction::RegisterBus;
use crate::trigger::Trigger;
use crate::utils::{clock_cycles, rand_nibble};

/// Pins of the device under test.
#[derive(Clone, Copy, Debug)]
pub struct Dut {
    pub scope: SimObject,
    pub clk: SimObject,
    pub rst_n: SimObject,
    pub ena: SimObject,
    pub test_mode: SimObject,
    pub lpbk_en: SimObject,
    pub tx_data: SimObject,
    pub tx_valid: SimObject,
    pub rx_data: SimObject,
    pub rx_valid: SimObject,
    pub scl: SimObject,
    pub sda_out: SimObject,
    pub sda_oe: SimObject,
    pub sda_internal: SimObject,
    /// Supply monitors are optional pins.
    pub dvdd_ok: Option<SimObject>,
    pub avdd_ok: Option<SimObject>,
}

impl Dut {
    pub fn bind(scope_name: &str) -> TbResult<Self> {
        let scope = SimObject::from_name(scope_name)?;
        let pin = |name: &str| scope.get_child(name);
        Ok(Self {
            scope,
            clk: pin("clk")?,
            rst_n: pin("rst_n")?,
            ena: pin("ena")?,
            test_mode: pin("test_mode")?,
            lpbk_en: pin("lpbk_en")?,
            tx_data: pin("tx_data")?,
            tx_valid: pin("tx_valid")?,
            rx_data: pin("rx_data")?,
            rx_valid: pin("rx_valid")?,
            scl: pin("scl")?,
            sda_out: pin("sda_out")?,
            sda_oe: pin("sda_oe")?,
            sda_internal: pin("sda_internal")?,
            dvdd_ok: pin("dvdd_ok").ok(),
            avdd_ok: pin("avdd_ok").ok(),
        })
    }

    pub fn i2c_pins(&self) -> I2cPins {
        I2cPins {
            scl: self.scl,
            sda_out: self.sda_out,
            sda_oe: self.sda_oe,
            sda_in: self.sda_internal,
        }
    }
}

/// Everything a scenario drives the PHY with. Creating it starts the
/// system clock.
pub struct PhyEnv {
    pub cfg: TbConfig,
    pub dut: Dut,
    pub phy: PhyController,
    pub por: PorSequencer,
}

impl PhyEnv {
    pub fn new(cfg: TbConfig) -> TbResult<Self> {
        let dut = Dut::bind(SCOPE)?;
        let master = I2cMaster::with_timing(dut.i2c_pins(), cfg.i2c.timing)?;
        let bus = RegisterBus::with_slave_addr(master, cfg.i2c.slave_addr);
        let phy = PhyController::new(bus, dut.clk).with_timeouts(cfg.lock);
        let por = PorSequencer::new(dut, cfg.por);
        Task::spawn(clock(dut.clk, cfg.clock.period_ps, "ps"), "sys_clk");
        Ok(Self { cfg, dut, phy, por })
    }

    pub fn bus(&self) -> &RegisterBus {
        self.phy.bus()
    }

    /// A second bus on the same pins with different timing.
    pub fn bus_with_timing(&self, timing: I2cTiming) -> TbResult<RegisterBus> {
        let master = I2cMaster::with_timing(self.dut.i2c_pins(), timing)?;
        Ok(RegisterBus::with_slave_addr(master, self.cfg.i2c.slave_addr))
    }

    /// A bus addressing some other slave, for selectivity tests.
    pub fn bus_for_slave(&self, slave_addr: u8) -> RegisterBus {
        RegisterBus::with_slave_addr(self.bus().master().clone(), slave_addr)
    }

    /// Reset sequence plus the stabilization wait.
    pub async fn setup(&self) -> TbResult<PorReport> {
        info!("=== Test Setup Started ===");
        let report = self.por.reset_sequence().await?;
        self.cycles(self.cfg.por.stabilization_cycles).await?;
        info!("=== Test Setup Complete ===");
        Ok(report)
    }

    pub async fn cycles(&self, n: u32) -> TbResult<()> {
        clock_cycles(self.dut.clk, n).await
    }

    async fn send_word(&self, word: u8) -> TbResult<()> {
        self.dut.tx_data.set((word & 0x0F) as u32)?;
        self.dut.tx_valid.set(1)?;
        self.cycles(1).await?;
        self.dut.tx_valid.set(0)?;
        self.cycles(1).await
    }

    /// Presents each word on tx_data for one cycle with tx_valid, then one
    /// idle cycle.
    pub async fn send_data_words(&self, words: &[u8]) -> TbResult<()> {
        for &w in words {
            self.send_word(w).await?;
        }
        debug!(words = words.len(), "data words sent");
        Ok(())
    }

    pub async fn send_random_words(&self, n: usize) -> TbResult<Vec<u8>> {
        let words: Vec<u8> = (0..n).map(|_| rand_nibble()).collect();
        self.send_data_words(&words).await?;
        Ok(words)
    }

    /// Sends `n` words taken from a PRBS-7 sequence seeded with all ones.
    pub async fn send_prbs_data(&self, n: usize) -> TbResult<Vec<u8>> {
        let words = prbs7_words(n);
        self.send_data_words(&words).await?;
        Ok(words)
    }

    /// Writes the counting pattern `0, 1, 2, ...` into the TX FIFO.
    pub async fn fill_tx_fifo(&self, n: usize) -> TbResult<()> {
        self.send_data_words(&Pattern::Counting.generate(n)).await
    }

    /// rx_data with undefined bits read as 0; the flag is set only when
    /// rx_valid is high and the data is fully defined.
    pub fn safe_read_rx_data(&self) -> (u8, bool) {
        let data = self.dut.rx_data.value_or_x();
        let valid = self.dut.rx_valid.logic().is_one() && data.is_fully_defined();
        (data.to_u32_lossy() as u8, valid)
    }

    /// Forwards every word the PHY flags valid on its RX port to `monitor`.
    pub fn spawn_rx_monitor(&self, monitor: Monitor<u8>) {
        let dut = self.dut;
        Task::spawn(
            async move {
                loop {
                    dut.clk.rising_edge().await?;
                    if dut.rx_valid.logic().is_one() {
                        let word = dut.rx_data.sampled();
                        if word.valid {
                            monitor.to_scoreboard(word.value as u8)?;
                        }
                    }
                }
            },
            "rx_monitor",
        );
    }
}

/// Nibbles of the x^7 + x^6 + 1 sequence from seed 0x7F, one LFSR step per word.
pub fn prbs7_words(n: usize) -> Vec<u8> {
    let mut lfsr: u8 = 0x7F;
    (0..n)
        .map(|_| {
            let feedback = ((lfsr >> 6) ^ (lfsr >> 5)) & 1;
            lfsr = ((lfsr << 1) | feedback) & 0x7F;
            lfsr & 0x0F
        })
        .collect()
}

/// Manchester code of `byte`, MSB first: 0 becomes `10`, 1 becomes `01`.
pub fn manchester_encode(byte: u8) -> u16 {
    (0..8).rev().fold(0u16, |acc, i| {
        let symbol = if (byte >> i) & 1 == 0 { 0b10 } else { 0b01 };
        (acc << 2) | symbol
    })
}

/// 4-bit test data patterns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    WalkingOnes,
    WalkingZeros,
    Alternating,
    AllZeros,
    AllOnes,
    Random,
    Counting,
}

impl Pattern {
    pub fn generate(self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| match self {
                Pattern::WalkingOnes => 1 << (i % 4),
                Pattern::WalkingZeros => !(1u8 << (i % 4)) & 0x0F,
                Pattern::Alternating if i % 2 == 0 => 0x0A,
                Pattern::Alternating => 0x05,
                Pattern::AllZeros => 0x00,
                Pattern::AllOnes => 0x0F,
                Pattern::Random => rand_nibble(),
                Pattern::Counting => (i & 0x0F) as u8,
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunStats {
    pub sim_ns: f64,
    pub wall_secs: f64,
}

/// Runs `test` against a freshly built device model in a new simulation.
///
/// The model's processes are started before the test body so that at every
/// clock edge the device samples its inputs before the testbench changes them.
pub fn run_phy_test<F, Fut>(cfg: &TbConfig, model_cfg: PhyModelConfig, test: F) -> TbResult<RunStats>
where
    F: FnOnce(PhyEnv) -> Fut + Send + 'static,
    Fut: Future<Output = TbResult<()>> + Send + 'static,
{
    let (stats, result) = run_phy_test_with_stats(cfg, model_cfg, test);
    result.map(|_| stats)
}

/// Like [`run_phy_test`], but the timing is reported for failed runs too.
pub fn run_phy_test_with_stats<F, Fut>(
    cfg: &TbConfig,
    model_cfg: PhyModelConfig,
    test: F,
) -> (RunStats, TbResult<()>)
where
    F: FnOnce(PhyEnv) -> Fut + Send + 'static,
    Fut: Future<Output = TbResult<()>> + Send + 'static,
{
    let mut native = NativeSim::new();
    let model = PhyModel::build(&mut native, model_cfg);
    let cfg = cfg.clone();
    let mut sim = Simulation::new(native).with_time_limit_ns(cfg.sim.time_limit_ns);
    let result = sim.run(async move {
        model.spawn()?;
        Trigger::next_delta().await?;
        test(PhyEnv::new(cfg)?).await
    });
    let stats = RunStats {
        sim_ns: sim.final_time_ns(),
        wall_secs: sim.wall_secs(),
    };
    (stats, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manchester_of_known_bytes() {
        assert_eq!(manchester_encode(0x00), 0xAAAA);
        assert_eq!(manchester_encode(0xFF), 0x5555);
        assert_eq!(manchester_encode(0x80), 0x6AAA);
    }

    #[test]
    fn patterns() {
        assert_eq!(Pattern::WalkingOnes.generate(5), vec![1, 2, 4, 8, 1]);
        assert_eq!(Pattern::WalkingZeros.generate(4), vec![0xE, 0xD, 0xB, 0x7]);
        assert_eq!(Pattern::Alternating.generate(3), vec![0xA, 0x5, 0xA]);
        assert_eq!(Pattern::Counting.generate(18)[17], 1);
        assert!(Pattern::Random.generate(32).iter().all(|w| *w < 16));
    }

    #[test]
    fn prbs_words_start_from_all_ones_seed() {
        // 0x7F -> 0x7E -> 0x7C -> 0x78
        assert_eq!(prbs7_words(3), vec![0xE, 0xC, 0x8]);
    }
}

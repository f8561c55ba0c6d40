//! Typed control of the PHY through its register map.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TbResult;
use crate::poll::{poll_until, PollConfig, PollReport};
use crate::regmap::{bits, Register};
use crate::signal::SimObject;
use crate::transaction::{RegisterBus, WriteAck};

#[inline]
fn bit(flag: bool, mask: u8) -> u8 {
    if flag {
        mask
    } else {
        0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhyEnable {
    pub phy_en: bool,
    pub iso_en: bool,
}

impl PhyEnable {
    pub fn to_bits(self) -> u8 {
        bit(self.phy_en, bits::PHY_EN) | bit(self.iso_en, bits::ISO_EN)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            phy_en: raw & bits::PHY_EN != 0,
            iso_en: raw & bits::ISO_EN != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxConfig {
    pub enable: bool,
    pub fifo_en: bool,
    pub prbs_en: bool,
    pub idle: bool,
}

impl TxConfig {
    pub fn to_bits(self) -> u8 {
        bit(self.enable, bits::TX_EN)
            | bit(self.fifo_en, bits::TX_FIFO_EN)
            | bit(self.prbs_en, bits::TX_PRBS_EN)
            | bit(self.idle, bits::TX_IDLE)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            enable: raw & bits::TX_EN != 0,
            fifo_en: raw & bits::TX_FIFO_EN != 0,
            prbs_en: raw & bits::TX_PRBS_EN != 0,
            idle: raw & bits::TX_IDLE != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RxConfig {
    pub enable: bool,
    pub fifo_en: bool,
    pub prbs_chk_en: bool,
    /// Self-clearing: resynchronises the PRBS checker and reads back 0.
    pub align_rst: bool,
}

impl RxConfig {
    pub fn to_bits(self) -> u8 {
        bit(self.enable, bits::RX_EN)
            | bit(self.fifo_en, bits::RX_FIFO_EN)
            | bit(self.prbs_chk_en, bits::RX_PRBS_CHK_EN)
            | bit(self.align_rst, bits::RX_ALIGN_RST)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            enable: raw & bits::RX_EN != 0,
            fifo_en: raw & bits::RX_FIFO_EN != 0,
            prbs_chk_en: raw & bits::RX_PRBS_CHK_EN != 0,
            align_rst: raw & bits::RX_ALIGN_RST != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TxSource {
    #[default]
    Prbs,
    Fifo,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RxSource {
    #[default]
    Fifo,
    PrbsStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataSelect {
    pub tx: TxSource,
    pub rx: RxSource,
}

impl DataSelect {
    pub fn to_bits(self) -> u8 {
        bit(self.tx == TxSource::Fifo, bits::TX_DATA_SEL)
            | bit(self.rx == RxSource::PrbsStatus, bits::RX_DATA_SEL)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            tx: if raw & bits::TX_DATA_SEL != 0 {
                TxSource::Fifo
            } else {
                TxSource::Prbs
            },
            rx: if raw & bits::RX_DATA_SEL != 0 {
                RxSource::PrbsStatus
            } else {
                RxSource::Fifo
            },
        }
    }
}

/// PLL settings. The default is the bring-up setting: trim 8, reset released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PllConfig {
    pub vco_trim: u8,
    pub cp_current: u8,
    pub reset: bool,
    pub bypass: bool,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            vco_trim: 8,
            cp_current: 0,
            reset: false,
            bypass: false,
        }
    }
}

impl PllConfig {
    pub fn to_bits(self) -> u8 {
        (self.vco_trim & bits::VCO_TRIM_MASK)
            | ((self.cp_current << bits::CP_CURRENT_SHIFT) & bits::CP_CURRENT_MASK)
            | bit(self.reset, bits::PLL_RST)
            | bit(self.bypass, bits::PLL_BYPASS)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            vco_trim: raw & bits::VCO_TRIM_MASK,
            cp_current: (raw & bits::CP_CURRENT_MASK) >> bits::CP_CURRENT_SHIFT,
            reset: raw & bits::PLL_RST != 0,
            bypass: raw & bits::PLL_BYPASS != 0,
        }
    }
}

/// CDR settings. The default is gain 4 with reset released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CdrConfig {
    pub gain: u8,
    pub fast_lock: bool,
    pub reset: bool,
}

impl Default for CdrConfig {
    fn default() -> Self {
        Self {
            gain: 4,
            fast_lock: false,
            reset: false,
        }
    }
}

impl CdrConfig {
    pub fn to_bits(self) -> u8 {
        (self.gain & bits::CDR_GAIN_MASK)
            | bit(self.fast_lock, bits::CDR_FAST_LOCK)
            | bit(self.reset, bits::CDR_RST)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            gain: raw & bits::CDR_GAIN_MASK,
            fast_lock: raw & bits::CDR_FAST_LOCK != 0,
            reset: raw & bits::CDR_RST != 0,
        }
    }
}

/// Debug sources routed to the analog test bus. Meant to be used one at a
/// time, but the hardware accepts any combination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugConfig {
    pub vctrl: bool,
    pub pd: bool,
    pub fifo: bool,
}

impl DebugConfig {
    pub fn to_bits(self) -> u8 {
        bit(self.vctrl, bits::DBG_VCTRL) | bit(self.pd, bits::DBG_PD) | bit(self.fifo, bits::DBG_FIFO)
    }

    pub fn from_bits(raw: u8) -> Self {
        Self {
            vctrl: raw & bits::DBG_VCTRL != 0,
            pd: raw & bits::DBG_PD != 0,
            fifo: raw & bits::DBG_FIFO != 0,
        }
    }
}

/// Decoded STATUS register. Reading STATUS clears the sticky error bits, so a
/// snapshot is only valid for the read that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub raw: u8,
    pub pll_lock: bool,
    pub cdr_lock: bool,
    pub tx_fifo_full: bool,
    pub tx_fifo_empty: bool,
    pub rx_fifo_full: bool,
    pub rx_fifo_empty: bool,
    pub prbs_err: bool,
    pub fifo_err: bool,
}

impl StatusSnapshot {
    pub fn decode(raw: u8) -> Self {
        Self {
            raw,
            pll_lock: raw & bits::PLL_LOCK != 0,
            cdr_lock: raw & bits::CDR_LOCK != 0,
            tx_fifo_full: raw & bits::TX_FIFO_FULL != 0,
            tx_fifo_empty: raw & bits::TX_FIFO_EMPTY != 0,
            rx_fifo_full: raw & bits::RX_FIFO_FULL != 0,
            rx_fifo_empty: raw & bits::RX_FIFO_EMPTY != 0,
            prbs_err: raw & bits::PRBS_ERR != 0,
            fifo_err: raw & bits::FIFO_ERR != 0,
        }
    }

    pub fn locked(&self) -> bool {
        self.pll_lock && self.cdr_lock
    }

    /// Status bits that only change with device state, not with reads.
    pub fn non_sticky(&self) -> u8 {
        self.raw & !Register::Status.sticky_mask()
    }
}

/// Deadlines and cadences of the lock waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockTimeouts {
    pub pll: PollConfig,
    pub cdr: PollConfig,
    pub combined: PollConfig,
}

impl Default for LockTimeouts {
    fn default() -> Self {
        Self {
            pll: PollConfig::new(10_000, 100),
            cdr: PollConfig::new(100_000, 100),
            combined: PollConfig::new(2_000_000, 2400),
        }
    }
}

/// Semantic operations on the PHY.
#[derive(Clone, Debug)]
pub struct PhyController {
    bus: RegisterBus,
    clk: SimObject,
    timeouts: LockTimeouts,
}

impl PhyController {
    pub fn new(bus: RegisterBus, clk: SimObject) -> Self {
        Self {
            bus,
            clk,
            timeouts: LockTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: LockTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn bus(&self) -> &RegisterBus {
        &self.bus
    }

    pub fn timeouts(&self) -> &LockTimeouts {
        &self.timeouts
    }

    /// PHY on, isolation released.
    pub async fn enable_phy(&self) -> TbResult<WriteAck> {
        self.set_phy_enable(PhyEnable {
            phy_en: true,
            iso_en: false,
        })
        .await
    }

    pub async fn set_phy_enable(&self, cfg: PhyEnable) -> TbResult<WriteAck> {
        self.bus.write(Register::PhyEnable, cfg.to_bits()).await
    }

    pub async fn configure_tx(&self, cfg: TxConfig) -> TbResult<WriteAck> {
        self.bus.write(Register::TxConfig, cfg.to_bits()).await
    }

    pub async fn configure_rx(&self, cfg: RxConfig) -> TbResult<WriteAck> {
        self.bus.write(Register::RxConfig, cfg.to_bits()).await
    }

    /// Switching the TX source while TX is enabled is allowed.
    pub async fn configure_data_path(&self, cfg: DataSelect) -> TbResult<WriteAck> {
        self.bus.write(Register::DataSelect, cfg.to_bits()).await
    }

    pub async fn configure_pll(&self, cfg: PllConfig) -> TbResult<WriteAck> {
        self.bus.write(Register::PllConfig, cfg.to_bits()).await
    }

    pub async fn configure_cdr(&self, cfg: CdrConfig) -> TbResult<WriteAck> {
        self.bus.write(Register::CdrConfig, cfg.to_bits()).await
    }

    pub async fn configure_debug(&self, cfg: DebugConfig) -> TbResult<WriteAck> {
        self.bus.write(Register::Control, cfg.to_bits()).await
    }

    pub async fn read_status(&self) -> TbResult<StatusSnapshot> {
        Ok(StatusSnapshot::decode(self.bus.read(Register::Status).await?))
    }

    async fn wait_status(
        &self,
        what: &str,
        cfg: PollConfig,
        done: impl FnMut(&StatusSnapshot) -> bool,
    ) -> TbResult<PollReport<StatusSnapshot>> {
        poll_until(what, self.clk, cfg, || self.read_status(), done).await
    }

    /// Waits for both PLL and CDR lock.
    pub async fn wait_for_lock(&self) -> TbResult<PollReport<StatusSnapshot>> {
        self.wait_status("PLL+CDR lock", self.timeouts.combined, |s| s.locked())
            .await
    }

    pub async fn wait_for_pll_lock(&self) -> TbResult<PollReport<StatusSnapshot>> {
        self.wait_status("PLL lock", self.timeouts.pll, |s| s.pll_lock)
            .await
    }

    pub async fn wait_for_cdr_lock(&self) -> TbResult<PollReport<StatusSnapshot>> {
        self.wait_status("CDR lock", self.timeouts.cdr, |s| s.cdr_lock)
            .await
    }

    /// Datasheet bring-up: enable, release PLL reset, wait for PLL lock,
    /// PRBS TX, release CDR reset, PRBS-checking RX, wait for CDR lock.
    /// Returns whether both locks were seen.
    pub async fn full_initialization(&self) -> TbResult<bool> {
        self.enable_phy().await?;
        self.configure_pll(PllConfig::default()).await?;
        if !self.wait_for_pll_lock().await?.satisfied {
            warn!("initialization stopped: PLL did not lock");
            return Ok(false);
        }

        self.configure_tx(TxConfig {
            enable: true,
            prbs_en: true,
            ..TxConfig::default()
        })
        .await?;
        self.configure_data_path(DataSelect::default()).await?;
        self.configure_cdr(CdrConfig::default()).await?;
        self.configure_rx(RxConfig {
            enable: true,
            prbs_chk_en: true,
            ..RxConfig::default()
        })
        .await?;

        let cdr = self.wait_for_cdr_lock().await?;
        info!(cdr_locked = cdr.satisfied, "initialization finished");
        Ok(cdr.satisfied)
    }
}

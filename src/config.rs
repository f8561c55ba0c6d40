//! Testbench configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration and files only need to list what they change.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TbError, TbResult};
use crate::i2c::I2cTiming;
use crate::phy::LockTimeouts;
use crate::por::PorTiming;
use crate::regmap::SLAVE_ADDR;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbConfig {
    pub clock: ClockConfig,
    pub i2c: I2cConfig,
    pub por: PorTiming,
    pub lock: LockTimeouts,
    pub sim: SimConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// System clock period in ps.
    pub period_ps: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        // 10 MHz
        Self { period_ps: 100_000 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct I2cConfig {
    pub slave_addr: u8,
    pub timing: I2cTiming,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            slave_addr: SLAVE_ADDR,
            timing: I2cTiming::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated time after which a run is aborted.
    pub time_limit_ns: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_limit_ns: 50_000_000,
        }
    }
}

impl TbConfig {
    pub fn from_toml_str(content: &str) -> TbResult<Self> {
        let config: TbConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> TbResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> TbResult<()> {
        self.i2c.timing.validate()?;
        if self.clock.period_ps < 2 {
            return Err(TbError::Check(format!(
                "clock.period_ps = {} is too short to toggle",
                self.clock.period_ps
            )));
        }
        for (name, poll) in [
            ("pll", self.lock.pll),
            ("cdr", self.lock.cdr),
            ("combined", self.lock.combined),
        ] {
            if poll.interval_cycles == 0 {
                return Err(TbError::Check(format!(
                    "lock.{name}.interval_cycles must be at least 1"
                )));
            }
        }
        if self.i2c.slave_addr > 0x7F {
            return Err(TbError::Check(format!(
                "i2c.slave_addr 0x{:02X} is not a 7-bit address",
                self.i2c.slave_addr
            )));
        }
        Ok(())
    }

    /// System clock period in ns.
    pub fn clock_period_ns(&self) -> f64 {
        self.clock.period_ps as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = TbConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, TbConfig::default());
        assert_eq!(cfg.clock_period_ns(), 100.0);
        assert_eq!(cfg.por.timeout_cycles, 5000);
        assert_eq!(cfg.lock.combined.interval_cycles, 2400);
    }

    #[test]
    fn partial_sections_override_single_fields() {
        let toml = r#"
[clock]
period_ps = 41670

[i2c.timing]
data_setup_ns = 100

[por]
timeout_cycles = 800

[lock.pll]
timeout_ns = 20000
interval_cycles = 50
"#;
        let cfg = TbConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.clock.period_ps, 41_670);
        assert_eq!(cfg.i2c.timing.data_setup_ns, 100);
        assert_eq!(cfg.i2c.timing.scl_high_ns, 1000);
        assert_eq!(cfg.por.timeout_cycles, 800);
        assert_eq!(cfg.por.reset_cycles, 10);
        assert_eq!(cfg.lock.pll.timeout_ns, 20_000);
        assert_eq!(cfg.lock.cdr, LockTimeouts::default().cdr);
    }

    #[test]
    fn invalid_timing_is_rejected() {
        let err = TbConfig::from_toml_str("[i2c.timing]\ndata_setup_ns = 10\n").unwrap_err();
        assert!(matches!(err, TbError::InvalidTiming(_)));
    }

    #[test]
    fn syntax_errors_surface_as_config_errors() {
        let err = TbConfig::from_toml_str("[clock\nperiod_ps = 1").unwrap_err();
        assert!(matches!(err, TbError::Config(_)));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = TbConfig::from_toml_str("[lock.cdr]\ntimeout_ns = 1000\ninterval_cycles = 0\n")
            .unwrap_err();
        assert!(matches!(err, TbError::Check(ref msg) if msg.contains("lock.cdr")));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tb.toml");
        std::fs::write(&path, "[sim]\ntime_limit_ns = 1000\n").unwrap();
        assert_eq!(TbConfig::load(&path).unwrap().sim.time_limit_ns, 1000);
    }
}

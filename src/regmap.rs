//! Register map of the PHY's I2C control interface.

use std::fmt;

/// 7-bit I2C slave address of the PHY.
pub const SLAVE_ADDR: u8 = 0x42;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    PhyEnable,
    TxConfig,
    RxConfig,
    DataSelect,
    PllConfig,
    CdrConfig,
    Status,
    Control,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::PhyEnable,
        Register::TxConfig,
        Register::RxConfig,
        Register::DataSelect,
        Register::PllConfig,
        Register::CdrConfig,
        Register::Status,
        Register::Control,
    ];

    pub fn addr(self) -> u8 {
        self as u8
    }

    pub fn from_addr(addr: u8) -> Option<Self> {
        Register::ALL.get(addr as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::PhyEnable => "PHY_ENABLE",
            Register::TxConfig => "TX_CONFIG",
            Register::RxConfig => "RX_CONFIG",
            Register::DataSelect => "DATA_SELECT",
            Register::PllConfig => "PLL_CONFIG",
            Register::CdrConfig => "CDR_CONFIG",
            Register::Status => "STATUS",
            Register::Control => "CONTROL",
        }
    }

    pub fn reset_value(self) -> u8 {
        match self {
            // PHY_EN=0, ISO_EN=1
            Register::PhyEnable => 0x02,
            // VCO_TRIM=8, PLL_RST=1
            Register::PllConfig => 0x48,
            // CDR_GAIN=4, CDR_RST=1
            Register::CdrConfig => 0x14,
            _ => 0x00,
        }
    }

    /// Bits that store what the host writes. All other bits are reserved and read 0.
    pub fn write_mask(self) -> u8 {
        match self {
            Register::PhyEnable => 0x03,
            Register::TxConfig => 0x0F,
            Register::RxConfig => 0x0F,
            Register::DataSelect => 0x03,
            Register::PllConfig => 0xFF,
            Register::CdrConfig => 0x1F,
            Register::Status => 0x00,
            Register::Control => 0x07,
        }
    }

    /// Bits that clear themselves one clock after being written.
    pub fn self_clearing_mask(self) -> u8 {
        match self {
            Register::RxConfig => bits::RX_ALIGN_RST,
            _ => 0x00,
        }
    }

    /// Bits that stay set until the register is read.
    pub fn sticky_mask(self) -> u8 {
        match self {
            Register::Status => bits::PRBS_ERR | bits::FIFO_ERR,
            _ => 0x00,
        }
    }

    pub fn is_read_only(self) -> bool {
        self.write_mask() == 0
    }

    /// What a read right after writing `written` returns, for registers that
    /// hold host data.
    pub fn expected_readback(self, written: u8) -> u8 {
        written & self.write_mask() & !self.self_clearing_mask()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.addr())
    }
}

/// Bit positions within the registers.
pub mod bits {
    // PHY_ENABLE
    pub const PHY_EN: u8 = 0x01;
    pub const ISO_EN: u8 = 0x02;

    // TX_CONFIG
    pub const TX_EN: u8 = 0x01;
    pub const TX_FIFO_EN: u8 = 0x02;
    pub const TX_PRBS_EN: u8 = 0x04;
    pub const TX_IDLE: u8 = 0x08;

    // RX_CONFIG
    pub const RX_EN: u8 = 0x01;
    pub const RX_FIFO_EN: u8 = 0x02;
    pub const RX_PRBS_CHK_EN: u8 = 0x04;
    pub const RX_ALIGN_RST: u8 = 0x08;

    // DATA_SELECT
    pub const TX_DATA_SEL: u8 = 0x01;
    pub const RX_DATA_SEL: u8 = 0x02;

    // PLL_CONFIG
    pub const VCO_TRIM_MASK: u8 = 0x0F;
    pub const CP_CURRENT_SHIFT: u8 = 4;
    pub const CP_CURRENT_MASK: u8 = 0x30;
    pub const PLL_RST: u8 = 0x40;
    pub const PLL_BYPASS: u8 = 0x80;

    // CDR_CONFIG
    pub const CDR_GAIN_MASK: u8 = 0x07;
    pub const CDR_FAST_LOCK: u8 = 0x08;
    pub const CDR_RST: u8 = 0x10;

    // STATUS
    pub const PLL_LOCK: u8 = 0x01;
    pub const CDR_LOCK: u8 = 0x02;
    pub const TX_FIFO_FULL: u8 = 0x04;
    pub const TX_FIFO_EMPTY: u8 = 0x08;
    pub const RX_FIFO_FULL: u8 = 0x10;
    pub const RX_FIFO_EMPTY: u8 = 0x20;
    pub const PRBS_ERR: u8 = 0x40;
    pub const FIFO_ERR: u8 = 0x80;

    // CONTROL
    pub const DBG_VCTRL: u8 = 0x01;
    pub const DBG_PD: u8 = 0x02;
    pub const DBG_FIFO: u8 = 0x04;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_dense() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.addr() as usize, i);
            assert_eq!(Register::from_addr(i as u8), Some(*reg));
        }
        assert_eq!(Register::from_addr(0x08), None);
    }

    #[test]
    fn reset_values_fit_write_masks() {
        for reg in Register::ALL {
            assert_eq!(reg.reset_value() & !reg.write_mask(), 0, "{}", reg);
        }
    }

    #[test]
    fn readback_drops_reserved_and_self_clearing_bits() {
        assert_eq!(Register::PhyEnable.expected_readback(0xFF), 0x03);
        assert_eq!(Register::RxConfig.expected_readback(0x0F), 0x07);
        assert_eq!(Register::PllConfig.expected_readback(0xA5), 0xA5);
        assert!(Register::Status.is_read_only());
    }
}

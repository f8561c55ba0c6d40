//! Clocked behavior behind the register file: PLL/CDR lock, TX FIFO and
//! serializer, loopback path, RX checker and FIFO.

use std::collections::VecDeque;

use crate::regmap::{bits, Register};

pub const FIFO_DEPTH: usize = 8;
/// TX_FIFO_FULL is raised one word before the FIFO is actually full.
pub const FIFO_ALMOST_FULL: usize = 7;
pub const IDLE_WORD: u8 = 0x5;
const PLL_BASE_LOCK_CYCLES: u32 = 60;
const CDR_BASE_LOCK_CYCLES: u32 = 2048;
const PRBS7_SEED: u8 = 0x7F;

/// PRBS-7 (x^7 + x^6 + 1) bit generator.
#[derive(Debug, Clone)]
pub(crate) struct Prbs7 {
    state: u8,
}

impl Prbs7 {
    pub fn new() -> Self {
        Self { state: PRBS7_SEED }
    }

    pub fn next_bit(&mut self) -> u8 {
        let bit = ((self.state >> 6) ^ (self.state >> 5)) & 1;
        self.state = ((self.state << 1) | bit) & 0x7F;
        bit
    }

    /// Next four bits, first one in the MSB.
    pub fn next_nibble(&mut self) -> u8 {
        (0..4).fold(0, |acc, _| (acc << 1) | self.next_bit())
    }
}

/// Self-synchronizing PRBS-7 checker: after seven bits it predicts every
/// following bit from the ones it has seen.
#[derive(Debug, Clone, Default)]
pub(crate) struct Prbs7Checker {
    history: u8,
    seen: u32,
}

impl Prbs7Checker {
    pub fn resync(&mut self) {
        self.history = 0;
        self.seen = 0;
    }

    pub fn synced(&self) -> bool {
        self.seen >= 7
    }

    /// Feeds a word MSB first; returns whether any bit was wrong.
    pub fn feed_nibble(&mut self, word: u8) -> bool {
        let mut error = false;
        for i in (0..4).rev() {
            let bit = (word >> i) & 1;
            if self.synced() {
                let predicted = ((self.history >> 6) ^ (self.history >> 5)) & 1;
                if predicted != bit {
                    error = true;
                }
            }
            self.history = ((self.history << 1) | bit) & 0x7F;
            self.seen += 1;
        }
        error
    }
}

/// Pin inputs sampled on a rising clock edge.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClockInputs {
    pub tx_data: u8,
    pub tx_valid: bool,
    pub lpbk_en: bool,
    pub test_mode: bool,
}

/// Parallel RX output after a clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RxOutput {
    pub data: u8,
    pub valid: bool,
}

#[derive(Debug)]
pub(crate) struct Datapath {
    cycle: u64,
    pub pll_locked: bool,
    pll_count: u32,
    pub cdr_locked: bool,
    cdr_count: u32,
    tx_fifo: VecDeque<u8>,
    prbs: Prbs7,
    word_phase: bool,
    loopback_latency: u64,
    in_flight: VecDeque<(u64, u8)>,
    pub checker: Prbs7Checker,
    rx_fifo: VecDeque<u8>,
    rx_out: RxOutput,
    /// Sticky error flags raised since the last STATUS read.
    pub sticky: u8,
}

impl Datapath {
    pub fn new(loopback_latency: u32) -> Self {
        Self {
            cycle: 0,
            pll_locked: false,
            pll_count: 0,
            cdr_locked: false,
            cdr_count: 0,
            tx_fifo: VecDeque::with_capacity(FIFO_DEPTH),
            prbs: Prbs7::new(),
            word_phase: false,
            loopback_latency: loopback_latency as u64,
            in_flight: VecDeque::new(),
            checker: Prbs7Checker::default(),
            rx_fifo: VecDeque::with_capacity(FIFO_DEPTH),
            rx_out: RxOutput {
                data: 0,
                valid: false,
            },
            sticky: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Datapath::new(self.loopback_latency as u32);
    }

    pub fn rx_output(&self) -> RxOutput {
        self.rx_out
    }

    #[cfg(test)]
    fn tx_fifo_len(&self) -> usize {
        self.tx_fifo.len()
    }

    /// Live STATUS bits, without the sticky ones.
    pub fn status_bits(&self) -> u8 {
        let mut s = 0;
        if self.pll_locked {
            s |= bits::PLL_LOCK;
        }
        if self.cdr_locked {
            s |= bits::CDR_LOCK;
        }
        if self.tx_fifo.len() >= FIFO_ALMOST_FULL {
            s |= bits::TX_FIFO_FULL;
        }
        if self.tx_fifo.is_empty() {
            s |= bits::TX_FIFO_EMPTY;
        }
        if self.rx_fifo.len() >= FIFO_ALMOST_FULL {
            s |= bits::RX_FIFO_FULL;
        }
        if self.rx_fifo.is_empty() {
            s |= bits::RX_FIFO_EMPTY;
        }
        s
    }

    /// One rising clock edge with the digital reset released.
    pub fn step(&mut self, regs: &mut [u8; 8], input: ClockInputs) {
        self.cycle += 1;
        let reg = |r: Register| regs[r.addr() as usize];
        let phy = reg(Register::PhyEnable);
        let tx = reg(Register::TxConfig);
        let rx = reg(Register::RxConfig);
        let sel = reg(Register::DataSelect);
        let pll = reg(Register::PllConfig);
        let cdr = reg(Register::CdrConfig);

        self.step_pll(phy, pll);

        // TX FIFO write port
        if input.tx_valid && tx & bits::TX_FIFO_EN != 0 {
            if self.tx_fifo.len() < FIFO_DEPTH {
                self.tx_fifo.push_back(input.tx_data & 0x0F);
            } else {
                self.sticky |= bits::FIFO_ERR;
            }
        }

        let tx_active = tx & bits::TX_EN != 0 && self.pll_locked;
        if tx_active {
            self.word_phase = !self.word_phase;
            if self.word_phase {
                if let Some(word) = self.next_tx_word(tx, sel) {
                    if input.lpbk_en {
                        self.in_flight
                            .push_back((self.cycle + self.loopback_latency, word));
                    }
                }
            }
        } else {
            self.word_phase = false;
        }

        self.step_cdr(rx, cdr, tx_active && input.lpbk_en);

        if rx & bits::RX_ALIGN_RST != 0 {
            self.checker.resync();
            regs[Register::RxConfig.addr() as usize] &= !bits::RX_ALIGN_RST;
        }

        self.rx_out.valid = false;
        while let Some(&(due, word)) = self.in_flight.front() {
            if due > self.cycle {
                break;
            }
            self.in_flight.pop_front();
            let word = if input.test_mode { word ^ 0x1 } else { word };
            self.receive(rx, word);
        }
        self.drive_rx(rx, sel);
    }

    fn step_pll(&mut self, phy: u8, pll: u8) {
        let enabled = phy & bits::PHY_EN != 0 && pll & bits::PLL_RST == 0;
        if !enabled {
            self.pll_locked = false;
            self.pll_count = 0;
        } else if pll & bits::PLL_BYPASS != 0 {
            self.pll_locked = true;
        } else if !self.pll_locked {
            let trim = (pll & bits::VCO_TRIM_MASK) as i32;
            let lock_cycles = PLL_BASE_LOCK_CYCLES + 4 * (trim - 8).unsigned_abs();
            self.pll_count += 1;
            self.pll_locked = self.pll_count >= lock_cycles;
        }
    }

    fn step_cdr(&mut self, rx: u8, cdr: u8, signal_present: bool) {
        let enabled = self.pll_locked
            && rx & bits::RX_EN != 0
            && cdr & bits::CDR_RST == 0
            && signal_present;
        if !enabled {
            self.cdr_locked = false;
            self.cdr_count = 0;
        } else if !self.cdr_locked {
            let gain = (cdr & bits::CDR_GAIN_MASK) as u32;
            let mut lock_cycles = CDR_BASE_LOCK_CYCLES / (gain + 1);
            if cdr & bits::CDR_FAST_LOCK != 0 {
                lock_cycles /= 4;
            }
            self.cdr_count += 1;
            self.cdr_locked = self.cdr_count >= lock_cycles;
        }
    }

    fn next_tx_word(&mut self, tx: u8, sel: u8) -> Option<u8> {
        if tx & bits::TX_IDLE != 0 {
            Some(IDLE_WORD)
        } else if sel & bits::TX_DATA_SEL != 0 {
            self.tx_fifo.pop_front()
        } else if tx & bits::TX_PRBS_EN != 0 {
            Some(self.prbs.next_nibble())
        } else {
            None
        }
    }

    fn receive(&mut self, rx: u8, word: u8) {
        if rx & bits::RX_EN == 0 {
            return;
        }
        if rx & bits::RX_PRBS_CHK_EN != 0 && self.checker.feed_nibble(word) {
            self.sticky |= bits::PRBS_ERR;
        }
        if rx & bits::RX_FIFO_EN != 0 {
            if self.rx_fifo.len() < FIFO_DEPTH {
                self.rx_fifo.push_back(word);
            } else {
                self.sticky |= bits::FIFO_ERR;
            }
        } else {
            self.rx_out = RxOutput {
                data: word,
                valid: true,
            };
        }
    }

    fn drive_rx(&mut self, rx: u8, sel: u8) {
        if rx & bits::RX_EN == 0 {
            return;
        }
        if sel & bits::RX_DATA_SEL != 0 {
            // PRBS status: bit0 checker synced, bit1 error seen since last STATUS read
            let mut status = 0;
            if self.checker.synced() {
                status |= 0x1;
            }
            if self.sticky & bits::PRBS_ERR != 0 {
                status |= 0x2;
            }
            self.rx_out = RxOutput {
                data: status,
                valid: false,
            };
        } else if let Some(word) = self.rx_fifo.pop_front() {
            self.rx_out = RxOutput {
                data: word,
                valid: true,
            };
        }
    }
}

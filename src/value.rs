use std::fmt;
use std::str::FromStr;

use crate::error::TbError;

/// One four-state simulation bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Logic {
    Zero,
    One,
    X,
    Z,
}

impl Logic {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Logic::One
        } else {
            Logic::Zero
        }
    }

    pub fn is_one(self) -> bool {
        self == Logic::One
    }

    pub fn is_zero(self) -> bool {
        self == Logic::Zero
    }

    pub fn is_binary(self) -> bool {
        matches!(self, Logic::Zero | Logic::One)
    }

    pub fn to_char(self) -> char {
        match self {
            Logic::Zero => '0',
            Logic::One => '1',
            Logic::X => 'x',
            Logic::Z => 'z',
        }
    }

    /// `u`, `w` and `-` (VHDL std_logic leftovers) are folded into X.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' | 'X' | 'u' | 'U' | 'w' | 'W' | '-' => Some(Logic::X),
            'z' | 'Z' => Some(Logic::Z),
            _ => None,
        }
    }
}

/// A four-state bit vector. Index 0 is the LSB; text form is MSB first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogicVec {
    bits: Vec<Logic>,
}

impl LogicVec {
    pub fn filled(width: u32, bit: Logic) -> Self {
        Self {
            bits: vec![bit; width as usize],
        }
    }

    pub fn unknown(width: u32) -> Self {
        Self::filled(width, Logic::X)
    }

    pub fn high_z(width: u32) -> Self {
        Self::filled(width, Logic::Z)
    }

    pub fn from_u32(value: u32, width: u32) -> Self {
        let bits = (0..width)
            .map(|i| Logic::from_bool(i < 32 && (value >> i) & 1 == 1))
            .collect();
        Self { bits }
    }

    pub fn from_logic(bit: Logic) -> Self {
        Self { bits: vec![bit] }
    }

    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn bit(&self, index: u32) -> Logic {
        self.bits.get(index as usize).copied().unwrap_or(Logic::X)
    }

    pub fn set_bit(&mut self, index: u32, bit: Logic) {
        if let Some(b) = self.bits.get_mut(index as usize) {
            *b = bit;
        }
    }

    pub fn is_fully_defined(&self) -> bool {
        self.bits.iter().all(|b| b.is_binary())
    }

    /// True when no bit carries a binary digit (`XXXX`, `ZZZZ`, mixes thereof).
    pub fn is_fully_undefined(&self) -> bool {
        !self.bits.iter().any(|b| b.is_binary())
    }

    /// Strict conversion: `None` if any bit is X or Z.
    pub fn to_u32(&self) -> Option<u32> {
        self.is_fully_defined().then(|| self.to_u32_lossy())
    }

    /// Non-binary digits are read as 0.
    pub fn to_u32_lossy(&self) -> u32 {
        self.bits
            .iter()
            .take(32)
            .enumerate()
            .filter(|(_, b)| b.is_one())
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }

    pub fn sample(&self) -> Sampled {
        if self.is_fully_undefined() {
            return Sampled {
                value: 0,
                valid: false,
            };
        }
        Sampled {
            value: self.to_u32_lossy(),
            valid: self.is_fully_defined(),
        }
    }
}

impl fmt::Display for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bits.iter().rev() {
            write!(f, "{}", b.to_char())?;
        }
        Ok(())
    }
}

impl FromStr for LogicVec {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // remove '_' and 0b
        let stripped = s.trim().trim_start_matches("0b").replace('_', "");
        if stripped.is_empty() {
            return Err(TbError::BadValue(s.to_string()));
        }
        let mut bits = Vec::with_capacity(stripped.len());
        for c in stripped.chars().rev() {
            bits.push(Logic::from_char(c).ok_or_else(|| TbError::BadValue(s.to_string()))?);
        }
        Ok(Self { bits })
    }
}

/// Numeric view of a pin value.
///
/// `valid` is false whenever a non-binary digit was replaced. A value with no
/// binary digit at all reads as 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampled {
    pub value: u32,
    pub valid: bool,
}

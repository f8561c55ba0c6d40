//! Pin-level testbench for a SerDes PHY.
//!
//! The crate drives a device through its pins on a cooperative, event-driven
//! simulator: a bit-banged I2C master, register transactions on top of it,
//! status polling, a PHY control layer and a reset/POR sequencer. A
//! behavioral model of the PHY stands in for the device.

pub mod assertion;
pub mod config;
pub mod env;
pub mod error;
mod executor;
pub mod i2c;
mod junit;
pub mod kernel;
pub mod logging;
pub mod model;
pub mod phy;
pub mod poll;
pub mod por;
pub mod prelude;
pub mod regmap;
pub mod shared;
mod signal;
pub mod sim;
pub mod sim_if;
pub mod test;
pub mod testbench;
pub mod transaction;
mod trigger;
pub mod utils;
mod value;

pub use executor::{JoinHandle, Task};
pub use junit::write_junit_xml;
pub use signal::SimObject;
pub use trigger::Trigger;
pub use value::{Logic, LogicVec, Sampled};

pub use crate::assertion::{print_assertion_stats, Assertion};
pub use crate::config::TbConfig;
pub use crate::env::{run_phy_test, Dut, Pattern, PhyEnv};
pub use crate::error::{TbError, TbResult};
pub use crate::executor::{JoinHandle, Task};
pub use crate::i2c::{I2cMaster, I2cTiming};
pub use crate::model::{PhyModelConfig, FIFO_ALMOST_FULL, FIFO_DEPTH, IDLE_WORD};
pub use crate::phy::{
    CdrConfig, DataSelect, DebugConfig, PhyController, PhyEnable, PllConfig, RxConfig, RxSource,
    StatusSnapshot, TxConfig, TxSource,
};
pub use crate::por::{PorReport, PorSequencer, PorState};
pub use crate::regmap::{bits, Register, SLAVE_ADDR};
pub use crate::shared::TbObj;
pub use crate::signal::SimObject;
pub use crate::sim_if::sim_time_ns;
pub use crate::testbench::{Monitor, Scoreboard};
pub use crate::transaction::{RegisterBus, WriteAck};
pub use crate::trigger::Trigger;
pub use crate::utils::clock_cycles;
pub use crate::value::{Logic, LogicVec};
pub use crate::{check, check_eq};
pub use futures::future::FutureExt;

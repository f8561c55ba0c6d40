mod common;

use common::{run, run_with};
use phytb::prelude::*;

async fn address_selectivity(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    for addr in 0..0x80u8 {
        let ack = env.bus().probe_address(addr).await?;
        check!(ack == (addr == SLAVE_ADDR), "address 0x{:02X}: ack={}", addr, ack);
    }
    Ok(())
}

#[test]
fn test_address_selectivity() {
    run(address_selectivity);
}

async fn wrong_address(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    let acks = env.bus_for_slave(0x41).write_register(0x00, 0x01).await?;
    check!(acks.as_array() == [false; 3], "wrong address acknowledged: {:?}", acks);
    check_eq!(env.bus().read_register(0x00).await?, 0x02, "PHY_ENABLE after foreign write");

    let acks = env.bus().write_register(0x00, 0x01).await?;
    check!(acks.all());
    check_eq!(env.bus().read_register(0x00).await?, 0x01, "PHY_ENABLE");
    Ok(())
}

#[test]
fn test_wrong_address_nack() {
    run(wrong_address);
}

async fn frequency_sweep(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    for (i, hz) in [10_000, 100_000, 400_000, 1_000_000].into_iter().enumerate() {
        let bus = env.bus_with_timing(I2cTiming::for_frequency(hz)?)?;
        let value = (i as u8 + 1) & 0x07;
        let acks = bus.write(Register::Control, value).await?;
        check!(acks.all(), "{} Hz write: {:?}", hz, acks);
        check_eq!(bus.read(Register::Control).await?, value, "{} Hz readback", hz);
    }
    Ok(())
}

#[test]
fn test_frequency_sweep() {
    run(frequency_sweep);
}

async fn minimum_margins(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    let timing = I2cTiming::minimum_margins();
    check_eq!(timing.data_setup_ns, 100, "SDA setup");
    check_eq!(timing.start_hold_ns, 600, "START hold");
    check_eq!(timing.stop_setup_ns, 600, "STOP setup");
    let bus = env.bus_with_timing(timing)?;
    for (reg, value) in [(Register::TxConfig, 0x0A), (Register::CdrConfig, 0x1B)] {
        check!(bus.write(reg, value).await?.all(), "{} write at minimum margins", reg);
        check_eq!(bus.read(reg).await?, value, "{} readback at minimum margins", reg);
    }
    Ok(())
}

#[test]
fn test_minimum_timing_margins() {
    run(minimum_margins);
}

async fn auto_increment(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    let m = env.bus().master();
    let addr = SLAVE_ADDR << 1;

    // burst write TX_CONFIG, RX_CONFIG, DATA_SELECT
    m.start_condition().await?;
    check!(m.write_byte(addr).await?);
    check!(m.write_byte(Register::TxConfig.addr()).await?);
    for value in [0x03, 0x05, 0x01] {
        check!(m.write_byte(value).await?, "burst byte 0x{:02X} NACKed", value);
    }
    m.stop_condition().await?;

    // burst read them back, ACKing all but the last byte
    m.start_condition().await?;
    check!(m.write_byte(addr).await?);
    check!(m.write_byte(Register::TxConfig.addr()).await?);
    m.start_condition().await?;
    check!(m.write_byte(addr | 1).await?);
    let mut read = Vec::new();
    for last in [false, false, true] {
        read.push(m.read_byte(!last).await?);
    }
    m.stop_condition().await?;
    check!(read == vec![0x03, 0x05, 0x01], "burst read {:02X?}", read);
    Ok(())
}

#[test]
fn test_burst_access_auto_increments() {
    run(auto_increment);
}

async fn no_contention(env: PhyEnv) -> TbResult<()> {
    let sda = env.dut.sda_internal;
    let mut bus_check = Assertion::spawn("sda_never_x", vec![sda], move || sda.logic() != Logic::X);
    env.setup().await?;
    env.bus().write(Register::PllConfig, 0x3C).await?;
    check_eq!(env.bus().read(Register::PllConfig).await?, 0x3C, "PLL_CONFIG");
    env.bus().read_all_registers().await?;
    bus_check.disable();
    print_assertion_stats(&[&bus_check]);

    check!(bus_check.stats().triggered > 100, "assertion barely ran: {:?}", bus_check.stats());
    bus_check.result()
}

#[test]
fn test_sda_has_no_contention() {
    run(no_contention);
}

async fn floating_bus(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    check!(env.dut.sda_internal.logic() == Logic::Z, "released SDA should float");
    // a floating line is not an ACK
    check!(!env.bus().probe_address(0x10).await?);
    // the slave still pulls low, and floating data bits read as 1
    check!(env.bus().probe_address(SLAVE_ADDR).await?);
    check_eq!(env.bus().read(Register::PllConfig).await?, 0x48, "PLL_CONFIG without pull-up");
    Ok(())
}

#[test]
fn test_bus_without_pullup() {
    run_with(
        PhyModelConfig {
            sda_pullup: false,
            ..PhyModelConfig::default()
        },
        floating_bus,
    );
}

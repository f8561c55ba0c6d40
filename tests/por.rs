mod common;

use common::{run, run_with};
use phytb::por::{check_progression, check_reset_release_order, monitor_por, PorTrace};
use phytb::prelude::*;

async fn basic_power_up(env: PhyEnv) -> TbResult<()> {
    let report = env.setup().await?;
    check!(report.probed, "POR probes should be visible");
    check!(report.completed, "POR did not complete: {:?}", report.transitions);
    check!(report.transitions.last() == Some(&PorState::Ready));
    check!(report.cycles < env.cfg.por.timeout_cycles);

    let phy_enable = env.bus().read_register(0x00).await?;
    check_eq!(phy_enable, 0x02, "PHY_ENABLE after power-up");
    Ok(())
}

#[test]
fn test_basic_power_up() {
    run(basic_power_up);
}

async fn por_sequence(env: PhyEnv) -> TbResult<()> {
    let probes = *env
        .por
        .probes()
        .ok_or_else(|| TbError::NotFound("POR probes".to_string()))?;
    let trace = TbObj::new(PorTrace::default());
    let monitor = Task::fork(monitor_por(env.dut.clk, probes, 400, trace.clone()));
    env.setup().await?;
    monitor.await?;

    let trace = trace.get().clone();
    check!(
        trace.sequence() == PorState::SEQUENCE.to_vec(),
        "unexpected POR sequence {:?}",
        trace.sequence()
    );
    check_progression(&trace.sequence())?;
    check_reset_release_order(&trace)?;
    let released = trace.analog_release.zip(trace.iso_release);
    check!(
        released.is_some_and(|(analog, iso)| analog < iso),
        "isolation released before analog reset"
    );

    let durations: Vec<u32> = trace.states.windows(2).skip(1).map(|w| w[1].0 - w[0].0).collect();
    check!(durations == vec![48, 24, 24, 24, 12], "state durations {:?}", durations);
    Ok(())
}

#[test]
fn test_por_sequence_and_release_order() {
    run(por_sequence);
}

async fn external_reset(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    check!(env.por.por_signals().is_some_and(|s| s.por_complete));

    env.dut.rst_n.set(0)?;
    Trigger::next_delta().await?;
    let sig = env.por.por_signals().ok_or_else(|| TbError::NotFound("POR probes".to_string()))?;
    check!(sig.state == Some(PorState::Reset), "state after reset: {:?}", sig.state);
    check!(!sig.por_complete && !sig.digital_reset_n && !sig.analog_reset_n);

    env.cycles(5).await?;
    env.dut.rst_n.set(1)?;
    check!(env.por.wait_for_por_state(PorState::Ready, 500).await?, "POR did not restart");
    let phy_enable = env.bus().read(Register::PhyEnable).await?;
    check_eq!(phy_enable, 0x02, "PHY_ENABLE after external reset");
    Ok(())
}

#[test]
fn test_external_reset_forces_reset_state() {
    run(external_reset);
}

async fn register_reset_on_external_reset(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    env.bus().write(Register::Control, 0x05).await?;
    check_eq!(env.bus().read(Register::Control).await?, 0x05, "CONTROL before reset");
    env.setup().await?;
    check_eq!(env.bus().read(Register::Control).await?, 0x00, "CONTROL after reset");
    Ok(())
}

#[test]
fn test_registers_return_to_reset_values() {
    run(register_reset_on_external_reset);
}

async fn hidden_probes(env: PhyEnv) -> TbResult<()> {
    check!(env.por.probes().is_none());
    let report = env.setup().await?;
    check!(!report.probed && !report.completed);
    check_eq!(report.cycles, env.cfg.por.fallback_cycles, "fixed wait");
    check!(!env.por.wait_for_por_state(PorState::Ready, 10).await?);
    check!(env.por.por_signals().is_none());

    // the device itself came up
    check_eq!(env.bus().read(Register::PhyEnable).await?, 0x02, "PHY_ENABLE");
    Ok(())
}

#[test]
fn test_hidden_probes_fall_back_to_fixed_wait() {
    run_with(
        PhyModelConfig {
            expose_internals: false,
            ..PhyModelConfig::default()
        },
        hidden_probes,
    );
}

async fn supply_loss(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    env.por.set_supplies(true, false)?;
    check!(env.por.wait_for_por_state(PorState::Error, 10).await?, "no ERROR on supply loss");
    let sig = env.por.por_signals().ok_or_else(|| TbError::NotFound("POR probes".to_string()))?;
    check!(!sig.power_good && !sig.digital_reset_n && !sig.por_active);

    // the slave is held in reset
    check!(!env.bus().probe_address(SLAVE_ADDR).await?, "ACK while in ERROR");

    env.por.set_supplies(true, true)?;
    check!(env.por.wait_for_por_state(PorState::Ready, 500).await?, "no recovery from ERROR");
    check!(env.bus().probe_address(SLAVE_ADDR).await?);
    Ok(())
}

#[test]
fn test_supply_loss_enters_error() {
    run(supply_loss);
}

async fn disabled_chip_stays_in_reset(env: PhyEnv) -> TbResult<()> {
    env.por.initialize_signals()?;
    env.dut.ena.set(0)?;
    env.por.assert_reset(env.cfg.por.reset_cycles).await?;
    check!(!env.por.wait_for_por_state(PorState::WaitSupply, 200).await?);
    check!(env.por.por_signals().is_some_and(|s| s.state == Some(PorState::Reset)));

    env.dut.ena.set(1)?;
    check!(env.por.wait_for_por_state(PorState::Ready, 500).await?);
    Ok(())
}

#[test]
fn test_chip_enable_gates_por() {
    run(disabled_chip_stays_in_reset);
}

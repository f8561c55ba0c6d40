mod common;

use phytb::logging;
use phytb::prelude::*;

async fn power_up_and_access(env: PhyEnv) -> TbResult<()> {
    let report = env.setup().await?;
    check!(report.completed, "POR at {} ns clock", env.cfg.clock_period_ns());
    check_eq!(env.bus().read(Register::PhyEnable).await?, 0x02, "PHY_ENABLE");
    env.bus().write(Register::CdrConfig, 0x0C).await?;
    check_eq!(env.bus().read(Register::CdrConfig).await?, 0x0C, "CDR_CONFIG");
    Ok(())
}

#[test]
fn test_reference_clock_sweep() {
    logging::init();
    // around the 24 MHz reference: 40.8 ns to 42.6 ns
    for period_ps in (40_800..=42_600).step_by(600) {
        let mut cfg = TbConfig::default();
        cfg.clock.period_ps = period_ps;
        let stats = run_phy_test(&cfg, PhyModelConfig::default(), power_up_and_access)
            .unwrap_or_else(|e| panic!("{} ps clock: {}", period_ps, e));
        assert!(stats.sim_ns > 0.0);
    }
}

async fn odd_period(env: PhyEnv) -> TbResult<()> {
    // 41667 ps does not split evenly; high and low differ by 1 ps
    env.setup().await?;
    let start = sim_time_ns();
    env.cycles(1000).await?;
    let elapsed = sim_time_ns() - start;
    check!((elapsed - 41_667.0).abs() < 1e-6, "1000 cycles took {} ns", elapsed);
    Ok(())
}

#[test]
fn test_uneven_clock_period() {
    logging::init();
    let mut cfg = TbConfig::default();
    cfg.clock.period_ps = 41_667;
    run_phy_test(&cfg, PhyModelConfig::default(), odd_period).unwrap();
}

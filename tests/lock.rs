mod common;

use common::{bring_up_pll, loopback, run};
use phytb::prelude::*;

async fn enable_and_verify(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    let start = sim_time_ns();
    env.phy.enable_phy().await?;
    env.phy.configure_pll(PllConfig::default()).await?;
    let pll = env.phy.wait_for_pll_lock().await?;
    check!(pll.satisfied, "PLL lock timed out after {} polls", pll.polls);
    let elapsed = sim_time_ns() - start;
    check!(elapsed < 1_000_000.0, "PLL lock took {} ns", elapsed);
    Ok(())
}

#[test]
fn test_enable_and_verify_pll_lock() {
    run(enable_and_verify);
}

async fn pll_held_in_reset(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    env.phy.enable_phy().await?;
    // reset value keeps PLL_RST set
    let pll = env.phy.wait_for_pll_lock().await?;
    check!(pll.timed_out(), "PLL locked while in reset");
    check!(pll.polls >= 1);
    check!(pll.last.is_some_and(|s| !s.pll_lock));
    Ok(())
}

#[test]
fn test_pll_lock_timeout_is_reported() {
    run(pll_held_in_reset);
}

async fn pll_bypass(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    env.phy
        .configure_pll(PllConfig {
            bypass: true,
            ..PllConfig::default()
        })
        .await?;
    check!(!env.phy.read_status().await?.pll_lock, "lock with PHY disabled");
    env.phy.enable_phy().await?;
    check!(env.phy.read_status().await?.pll_lock, "bypassed PLL not locked");
    Ok(())
}

#[test]
fn test_pll_bypass_locks_immediately() {
    run(pll_bypass);
}

async fn disable_drops_lock(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    bring_up_pll(&env).await?;
    env.phy
        .set_phy_enable(PhyEnable {
            phy_en: false,
            iso_en: true,
        })
        .await?;
    check!(!env.phy.read_status().await?.pll_lock, "lock survived PHY disable");
    Ok(())
}

#[test]
fn test_phy_disable_drops_pll_lock() {
    run(disable_drops_lock);
}

async fn full_initialization(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    env.dut.lpbk_en.set(1)?;
    check!(env.phy.full_initialization().await?, "initialization did not lock");
    let lock = env.phy.wait_for_lock().await?;
    check!(lock.satisfied && lock.polls == 1, "{:?}", lock);

    // polling status does not disturb it
    let first = env.phy.read_status().await?;
    let second = env.phy.read_status().await?;
    check_eq!(first.non_sticky(), second.non_sticky(), "repeated STATUS reads");
    check!(!first.prbs_err && !second.prbs_err, "PRBS errors on a clean loopback");
    Ok(())
}

#[test]
fn test_full_initialization() {
    run(full_initialization);
}

async fn initialization_without_loopback(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    // no signal reaches the CDR
    check!(!env.phy.full_initialization().await?, "CDR locked without a signal");
    let status = env.phy.read_status().await?;
    check!(status.pll_lock && !status.cdr_lock, "{:?}", status);
    Ok(())
}

#[test]
fn test_cdr_needs_a_signal() {
    run(initialization_without_loopback);
}

async fn cdr_lock_speed(env: PhyEnv) -> TbResult<()> {
    env.setup().await?;
    loopback(
        &env,
        TxConfig {
            enable: true,
            prbs_en: true,
            ..TxConfig::default()
        },
        DataSelect::default(),
        RxConfig {
            enable: true,
            ..RxConfig::default()
        },
    )
    .await?;
    let slow = env.phy.wait_for_cdr_lock().await?;
    check!(slow.satisfied, "CDR lock with gain 4");

    // gain 0 needs 2048 cycles; fast lock divides that by four
    env.phy
        .configure_cdr(CdrConfig {
            gain: 0,
            fast_lock: true,
            reset: true,
        })
        .await?;
    check!(!env.phy.read_status().await?.cdr_lock, "lock held through CDR reset");
    env.phy
        .configure_cdr(CdrConfig {
            gain: 0,
            fast_lock: true,
            reset: false,
        })
        .await?;
    let fast = env.phy.wait_for_cdr_lock().await?;
    check!(fast.satisfied, "CDR lock with fast lock");
    Ok(())
}

#[test]
fn test_cdr_lock_with_gain_and_fast_lock() {
    run(cdr_lock_speed);
}

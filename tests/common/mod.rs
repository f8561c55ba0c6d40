#![allow(dead_code)]

use std::future::Future;

use phytb::logging;
use phytb::prelude::*;

/// Runs a scenario against the default device with the default configuration.
pub fn run<F, Fut>(test: F)
where
    F: FnOnce(PhyEnv) -> Fut + Send + 'static,
    Fut: Future<Output = TbResult<()>> + Send + 'static,
{
    run_with(PhyModelConfig::default(), test)
}

pub fn run_with<F, Fut>(model: PhyModelConfig, test: F)
where
    F: FnOnce(PhyEnv) -> Fut + Send + 'static,
    Fut: Future<Output = TbResult<()>> + Send + 'static,
{
    run_configured(&TbConfig::default(), model, test)
}

pub fn run_configured<F, Fut>(cfg: &TbConfig, model: PhyModelConfig, test: F)
where
    F: FnOnce(PhyEnv) -> Fut + Send + 'static,
    Fut: Future<Output = TbResult<()>> + Send + 'static,
{
    logging::init();
    if let Err(e) = run_phy_test(cfg, model, test) {
        panic!("scenario failed: {e}");
    }
}

/// PHY enabled with the PLL running, TX and RX idle.
pub async fn bring_up_pll(env: &PhyEnv) -> TbResult<()> {
    env.phy.enable_phy().await?;
    env.phy.configure_pll(PllConfig::default()).await?;
    let pll = env.phy.wait_for_pll_lock().await?;
    check!(pll.satisfied, "PLL did not lock: {:?}", pll.last);
    Ok(())
}

/// Loopback of `tx` into an RX port configured as `rx`, with the CDR running.
pub async fn loopback(env: &PhyEnv, tx: TxConfig, select: DataSelect, rx: RxConfig) -> TbResult<()> {
    env.dut.lpbk_en.set(1)?;
    bring_up_pll(env).await?;
    env.phy.configure_data_path(select).await?;
    env.phy.configure_tx(tx).await?;
    env.phy.configure_cdr(CdrConfig::default()).await?;
    env.phy.configure_rx(rx).await?;
    Ok(())
}

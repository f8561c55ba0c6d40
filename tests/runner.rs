mod common;

use futures::future::BoxFuture;
use phytb::prelude::*;
use phytb::test::TestSuite;

fn passes(env: PhyEnv) -> BoxFuture<'static, TbResult<()>> {
    async move {
        env.setup().await?;
        check_eq!(env.bus().read(Register::PllConfig).await?, 0x48, "PLL_CONFIG");
        Ok(())
    }
    .boxed()
}

fn fails(env: PhyEnv) -> BoxFuture<'static, TbResult<()>> {
    async move {
        env.setup().await?;
        check!(env.bus().probe_address(0x41).await?, "nobody at 0x41");
        Ok(())
    }
    .boxed()
}

fn hidden(env: PhyEnv) -> BoxFuture<'static, TbResult<()>> {
    async move {
        check!(env.por.probes().is_none());
        Ok(())
    }
    .boxed()
}

#[test]
fn test_suite_reports_to_junit() {
    phytb::logging::init();
    let mut suite = TestSuite::new("phy_regression", TbConfig::default());
    suite
        .add("power_up", passes)
        .add("wrong_address", fails)
        .add_with_model(
            "hidden_probes",
            PhyModelConfig {
                expose_internals: false,
                ..PhyModelConfig::default()
            },
            hidden,
        );
    assert_eq!(suite.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.xml");
    let all_passed = suite.run_and_report(&path).unwrap();
    assert!(!all_passed);

    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.contains("phy_regression"));
    assert!(xml.contains("power_up"));
    assert!(xml.contains("nobody at 0x41"));
    assert!(xml.contains("hidden_probes"));
}

#[test]
fn test_failed_runs_keep_their_timing() {
    let suite = {
        let mut s = TestSuite::new("timing", TbConfig::default());
        s.add("wrong_address", fails);
        s
    };
    let outcomes = suite.run();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].passed());
    assert!(outcomes[0].sim_time_ns > 0.0);
}

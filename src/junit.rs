use std::fs::File;
use std::path::Path;

use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};

use crate::error::{TbError, TbResult};
use crate::test::TestOutcome;

pub fn write_junit_xml(suite: &str, outcomes: &[TestOutcome], path: &Path) -> TbResult<()> {
    let test_cases: Vec<_> = outcomes
        .iter()
        .map(|o| {
            let duration = Duration::seconds_f64(o.time_secs);
            match &o.result {
                Ok(()) => TestCaseBuilder::success(&o.name, duration),
                Err(msg) => TestCaseBuilder::failure(&o.name, duration, "failure", msg),
            }
            .build()
        })
        .collect();

    let test_suite = TestSuiteBuilder::new(suite).add_testcases(test_cases).build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| TbError::Report(e.to_string()))
}

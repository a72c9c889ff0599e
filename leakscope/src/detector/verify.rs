//! Test-harness entry points
//!
//! `verify_none` fits at the end of a single test; `verify_test_main` wraps a
//! whole suite and is the only choice when tests run in parallel, since
//! goroutines cannot be attributed to individual tests.

use std::io::{self, Write};

use log::{error, info};

use super::{LeakDetector, RunError};
use crate::domain::{ConfigError, DetectError};
use crate::dump::DumpSource;
use crate::options::{split_cleanup, EntryPoint, LeakOption, Options};

/// The part of a test harness that records failures.
pub trait TestReporter {
    /// Mark the test failed with `message`. The test keeps running.
    fn error(&mut self, message: &str);
}

/// Collects failure messages; handy in tests of tests.
impl TestReporter for Vec<String> {
    fn error(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

/// Fail `reporter` if unexpected goroutines remain.
///
/// Honours [`LeakOption::Pretty`]. A cleanup option runs afterwards with the
/// number of sampling attempts, whether or not leaks were found, and with 0
/// when the options were rejected.
pub fn verify_none<S: DumpSource>(
    detector: &mut LeakDetector<S>,
    reporter: &mut dyn TestReporter,
    options: impl IntoIterator<Item = LeakOption>,
) {
    let (options, cleanup) = split_cleanup(options);

    let attempts = match check(detector, options, EntryPoint::VerifyNone) {
        Ok(attempts) => attempts,
        Err(err) => {
            reporter.error(&err.error.to_string());
            err.attempts
        }
    };

    if let Some(cleanup) = cleanup {
        cleanup(attempts);
    }
}

/// Run a test suite, then check for leaks if it passed.
///
/// `run` returns the suite's exit code. Leaks (or a failed check) print to
/// stderr and turn a zero exit code into 1. Returns the code to exit with.
pub fn verify_test_main<S: DumpSource>(
    detector: &mut LeakDetector<S>,
    run: impl FnOnce() -> i32,
    options: impl IntoIterator<Item = LeakOption>,
) -> i32 {
    verify_test_main_to(detector, run, options, &mut io::stderr())
}

/// As [`verify_test_main`], writing failures to `out`.
pub fn verify_test_main_to<S: DumpSource>(
    detector: &mut LeakDetector<S>,
    run: impl FnOnce() -> i32,
    options: impl IntoIterator<Item = LeakOption>,
    out: &mut dyn Write,
) -> i32 {
    let (options, cleanup) = split_cleanup(options);

    let mut exit_code = run();
    let mut attempts = 0;

    if exit_code == 0 {
        match check(detector, options, EntryPoint::VerifyTestMain) {
            Ok(n) => attempts = n,
            Err(err) => {
                attempts = err.attempts;
                error!("leak check failed after a passing test run");
                let _ = writeln!(out, "leakscope: Errors on successful test run: {}", err.error);
                exit_code = 1;
            }
        }
    } else {
        info!("test run failed with exit code {exit_code}, skipping leak check");
    }

    if let Some(cleanup) = cleanup {
        cleanup(attempts);
    }
    exit_code
}

/// Build, validate and run. Leaks come back as a [`DetectError::Leak`] with
/// the attempt count.
fn check<S: DumpSource>(
    detector: &mut LeakDetector<S>,
    options: Vec<LeakOption>,
    entry: EntryPoint,
) -> Result<usize, RunError> {
    let rejected = |error: ConfigError| RunError { attempts: 0, error: error.into() };
    let mut opts = Options::build(options).map_err(rejected)?;
    opts.validate(entry).map_err(rejected)?;
    let pretty = opts.pretty;
    let detection = detector.run(&mut opts, pretty)?;
    match detection.leaks {
        Some(report) => Err(RunError { attempts: detection.attempts, error: DetectError::Leak(Box::new(report)) }),
        None => Ok(detection.attempts),
    }
}

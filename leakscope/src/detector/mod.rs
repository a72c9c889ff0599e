//! Leak detection loop
//!
//! ```text
//!   ┌──────────┐  parse + filter  ┌──────────┐  none left   ┌─────────┐
//!   │ Sampling │ ───────────────▶ │ Deciding │ ───────────▶ │ Success │
//!   └──────────┘                  └──────────┘              └─────────┘
//!        ▲                          │      │ policy says stop
//!        │   sleep per policy       │      ▼
//!        └──────────────────────────┘   ┌────────┐
//!                                       │ Failed │ → LeakReport
//!                                       └────────┘
//! ```
//!
//! Every retry re-samples from scratch; nothing but the attempt index carries
//! over. A dump source failure ends the run at once, without retrying.

pub mod retry;
pub mod verify;

use std::time::Duration;

use log::{debug, info, warn};

use crate::domain::{DetectError, ScanError, TaskId, TaskStack};
use crate::dump::DumpSource;
use crate::filter::FilterEngine;
use crate::options::{EntryPoint, LeakOption, Options};
use crate::parser::parse_dump;
use crate::report::{plain_message, pretty_message, LeakReport, Palette};
pub use retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use verify::{verify_none, verify_test_main, TestReporter};

/// Pause between attempts. Injectable so tests do not wait.
pub type Sleeper = Box<dyn FnMut(Duration)>;

/// How one detection run ended.
#[derive(Debug)]
pub struct Detection {
    /// Sampling attempts made, the final one included.
    pub attempts: usize,
    /// `None` when no unexpected goroutine was left.
    pub leaks: Option<LeakReport>,
}

/// A run that stopped on an error.
#[derive(Debug)]
pub struct RunError {
    /// Sampling attempts made, the failed one included. Zero when the run
    /// stopped before the first sample.
    pub attempts: usize,
    pub error: DetectError,
}

/// Detector over a dump source.
pub struct LeakDetector<S> {
    source: S,
    palette: Palette,
    sleep: Sleeper,
}

impl<S: DumpSource> LeakDetector<S> {
    pub fn new(source: S) -> Self {
        Self { source, palette: Palette::detect(), sleep: Box::new(std::thread::sleep) }
    }

    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleep: impl FnMut(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Look for unexpected goroutines, retrying per the options.
    ///
    /// # Errors
    /// [`DetectError::Leak`] with the plain report if goroutines remain once
    /// retries run out; configuration, dump and consistency errors otherwise.
    pub fn find(&mut self, options: impl IntoIterator<Item = LeakOption>) -> Result<(), DetectError> {
        self.find_with(options, EntryPoint::Find, false)
    }

    /// As [`find`](Self::find), with the dependency graph report.
    ///
    /// # Errors
    /// As [`find`](Self::find).
    pub fn find_pretty(&mut self, options: impl IntoIterator<Item = LeakOption>) -> Result<(), DetectError> {
        self.find_with(options, EntryPoint::FindPretty, true)
    }

    fn find_with(
        &mut self,
        options: impl IntoIterator<Item = LeakOption>,
        entry: EntryPoint,
        pretty: bool,
    ) -> Result<(), DetectError> {
        let mut opts = Options::build(options)?;
        opts.validate(entry)?;
        match self.run(&mut opts, pretty).map_err(|e| e.error)?.leaks {
            Some(report) => Err(DetectError::Leak(Box::new(report))),
            None => Ok(()),
        }
    }

    /// Snapshot every goroutine alive right now and return an option that
    /// ignores them. Taken before a test, it keeps pre-existing goroutines
    /// out of the results.
    ///
    /// # Errors
    /// [`DetectError::Scan`] if the dump cannot be read.
    pub fn ignore_current(&mut self) -> Result<LeakOption, DetectError> {
        let dump = self.source.all_tasks().map_err(ScanError::from)?;
        let parsed = parse_dump(&dump)?;
        if let Some(errors) = parsed.error() {
            warn!("ignore_current: {} stacks could not be parsed", errors.len());
        }
        let ids: Vec<TaskId> = parsed.stacks.iter().map(TaskStack::id).collect();
        debug!("ignoring {} pre-existing goroutines", ids.len());
        Ok(LeakOption::ignore_tasks(ids))
    }

    /// Run the sampling loop with already validated options.
    ///
    /// # Errors
    /// [`DetectError::Scan`] on a dump failure and
    /// [`DetectError::Inconsistent`] if the caller's own stack is unusable,
    /// each with the attempts made so far. Leaks are not an error here; they
    /// come back in [`Detection::leaks`].
    pub fn run(&mut self, opts: &mut Options, pretty: bool) -> Result<Detection, RunError> {
        let self_id = self.current_task_id().map_err(|error| RunError { attempts: 0, error })?;
        let engine = FilterEngine::new(self_id, &opts.filters);

        let mut attempt = 0;
        loop {
            let stacks = self.sample(attempt).map_err(|error| RunError { attempts: attempt + 1, error })?;
            let total = stacks.len();
            let leaked = engine.retain(stacks);
            debug!("attempt {attempt}: {} of {total} goroutines unexpected", leaked.len());

            if leaked.is_empty() {
                info!("no unexpected goroutines after {} attempts", attempt + 1);
                return Ok(Detection { attempts: attempt + 1, leaks: None });
            }

            let Some(delay) = opts.retry.next_delay(attempt) else {
                info!("{} unexpected goroutines after {} attempts", leaked.len(), attempt + 1);
                let message = if pretty {
                    pretty_message(&leaked, &engine, self.palette)
                } else {
                    plain_message(&leaked)
                };
                let report = LeakReport { attempts: attempt + 1, stacks: leaked, message };
                return Ok(Detection { attempts: attempt + 1, leaks: Some(report) });
            };

            if !delay.is_zero() {
                (self.sleep)(delay);
            }
            attempt += 1;
        }
    }

    fn sample(&mut self, attempt: usize) -> Result<Vec<TaskStack>, DetectError> {
        let dump = self.source.all_tasks().map_err(ScanError::from)?;
        let parsed = parse_dump(&dump)?;
        if let Some(errors) = parsed.error() {
            warn!("attempt {attempt}: {} stacks could not be parsed", errors.len());
        }
        Ok(parsed.stacks)
    }

    fn current_task_id(&mut self) -> Result<Option<TaskId>, DetectError> {
        let Some(dump) = self.source.current_task().map_err(ScanError::from)? else {
            return Ok(None);
        };
        let parsed = parse_dump(&dump)?;
        if let Some(errors) = parsed.error() {
            return Err(DetectError::Inconsistent(format!("failed to parse own stack: {errors}")));
        }
        match parsed.stacks.first() {
            Some(stack) => Ok(Some(stack.id())),
            None => Err(DetectError::Inconsistent("own stack dump contains no goroutine".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigError;
    use crate::dump::StaticDump;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    const SELF: &str = "goroutine 1 [running]:\nmain.main()\n\t/m.go:1 +0x1\n";
    const LEAK: &str = "goroutine 1 [running]:\n\
        main.main()\n\
        \t/m.go:1 +0x1\n\
        \n\
        goroutine 2 [chan receive]:\n\
        main.worker()\n\
        \t/m.go:9 +0x2\n\
        created by main.main in goroutine 1\n\
        \t/m.go:5 +0x3\n";

    /// Serves a queue of dumps and counts how often it was sampled.
    struct Scripted {
        dumps: Vec<&'static str>,
        samples: Rc<RefCell<usize>>,
    }

    impl DumpSource for Scripted {
        fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
            let mut samples = self.samples.borrow_mut();
            let idx = (*samples).min(self.dumps.len() - 1);
            *samples += 1;
            Ok(self.dumps[idx].as_bytes().to_vec())
        }

        fn current_task(&mut self) -> io::Result<Option<Vec<u8>>> {
            Ok(Some(SELF.as_bytes().to_vec()))
        }
    }

    fn scripted(dumps: Vec<&'static str>) -> (LeakDetector<Scripted>, Rc<RefCell<usize>>) {
        let samples = Rc::new(RefCell::new(0));
        let source = Scripted { dumps, samples: Rc::clone(&samples) };
        (LeakDetector::new(source).with_palette(Palette::plain()).with_sleeper(|_| {}), samples)
    }

    #[test]
    fn test_only_self_succeeds_immediately() {
        let (mut detector, samples) = scripted(vec![SELF]);
        detector.find(Vec::new()).unwrap();
        assert_eq!(*samples.borrow(), 1);
    }

    #[test]
    fn test_persistent_leak_samples_retries_plus_one() {
        let (mut detector, samples) = scripted(vec![LEAK]);
        let err = detector.find([LeakOption::MaxRetries(2)]).unwrap_err();
        assert_eq!(*samples.borrow(), 3);

        let report = err.leak_report().unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(report.task_ids(), vec![TaskId(2)]);
        assert!(err.to_string().starts_with("found unexpected goroutines:\n"));
        assert!(err.to_string().contains("Goroutine 2 in state chan receive, with main.worker on top of the stack:"));
    }

    #[test]
    fn test_leak_that_exits_during_retries() {
        let (mut detector, samples) = scripted(vec![LEAK, LEAK, SELF]);
        detector.find(Vec::new()).unwrap();
        assert_eq!(*samples.borrow(), 3);
    }

    #[test]
    fn test_sleeps_between_attempts() {
        let slept = Rc::new(RefCell::new(Vec::new()));
        let record = Rc::clone(&slept);
        let mut detector = LeakDetector::new(StaticDump::new(LEAK))
            .with_palette(Palette::plain())
            .with_sleeper(move |d| record.borrow_mut().push(d));

        let delay = Duration::from_millis(7);
        assert!(detector.find([LeakOption::fixed_delay(2, delay)]).is_err());
        assert_eq!(*slept.borrow(), vec![delay, delay]);
    }

    #[test]
    fn test_cleanup_rejected_before_sampling() {
        let (mut detector, samples) = scripted(vec![LEAK]);
        let err = detector.find([LeakOption::cleanup(|_| {})]).unwrap_err();
        assert!(matches!(err, DetectError::Config(ConfigError::CleanupNotSupported)));
        let err = detector.find_pretty([LeakOption::cleanup(|_| {})]).unwrap_err();
        assert!(matches!(err, DetectError::Config(ConfigError::CleanupNotSupported)));
        assert_eq!(*samples.borrow(), 0);
    }

    #[test]
    fn test_find_pretty_report() {
        let (mut detector, _) = scripted(vec![LEAK]);
        let err = detector.find_pretty([LeakOption::MaxRetries(0)]).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("[*] found unexpected goroutines:\n"));
        assert!(text.contains("└── 1\n    └── 2 (created by main.main in goroutine 1)\n"));
        assert!(text.contains("Source Goroutine ID: 1\n"));
    }

    #[test]
    fn test_filters_apply() {
        let (mut detector, _) = scripted(vec![LEAK]);
        detector.find([LeakOption::ignore_top_function("main.worker")]).unwrap();
    }

    #[test]
    fn test_without_self_every_goroutine_counts() {
        let mut detector = LeakDetector::new(StaticDump::new(SELF)).with_sleeper(|_| {});
        let err = detector.find([LeakOption::MaxRetries(0)]).unwrap_err();
        assert_eq!(err.leak_report().unwrap().task_ids(), vec![TaskId(1)]);
    }

    #[test]
    fn test_bad_own_stack_is_inconsistent() {
        let mut detector = LeakDetector::new(StaticDump::new(SELF).with_current("garbage\n"));
        assert!(matches!(detector.find(Vec::new()), Err(DetectError::Inconsistent(_))));

        let mut detector = LeakDetector::new(StaticDump::new(SELF).with_current("goroutine x [running]:\n"));
        assert!(matches!(detector.find(Vec::new()), Err(DetectError::Inconsistent(_))));
    }

    #[test]
    fn test_scan_failure_is_not_retried() {
        struct Broken(usize);
        impl DumpSource for Broken {
            fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
                self.0 += 1;
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "gone"))
            }
        }

        let mut detector = LeakDetector::new(Broken(0)).with_sleeper(|_| {});
        assert!(matches!(detector.find(Vec::new()), Err(DetectError::Scan(_))));
        assert_eq!(detector.source_mut().0, 1);
    }

    #[test]
    fn test_run_error_counts_attempts() {
        struct FailsThird(usize);
        impl DumpSource for FailsThird {
            fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
                self.0 += 1;
                if self.0 == 3 {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "dump went away"));
                }
                Ok(LEAK.as_bytes().to_vec())
            }

            fn current_task(&mut self) -> io::Result<Option<Vec<u8>>> {
                Ok(Some(SELF.as_bytes().to_vec()))
            }
        }

        let mut detector = LeakDetector::new(FailsThird(0)).with_sleeper(|_| {});
        let mut opts = Options::build(Vec::new()).unwrap();
        let err = detector.run(&mut opts, false).unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.error, DetectError::Scan(_)));

        let mut detector = LeakDetector::new(StaticDump::new(SELF).with_current("garbage\n"));
        let err = detector.run(&mut opts, false).unwrap_err();
        assert_eq!(err.attempts, 0);
    }

    #[test]
    fn test_ignore_current_snapshot() {
        let (mut detector, _) = scripted(vec![LEAK]);
        let snapshot = detector.ignore_current().unwrap();
        assert!(matches!(&snapshot, LeakOption::IgnoreTasks(ids) if ids.len() == 2));
        detector.find([snapshot]).unwrap();
    }

    #[test]
    fn test_malformed_stack_does_not_hide_leaks() {
        const MIXED: &str = "goroutine 1 [running]:\n\
            main.main()\n\
            goroutine 3 [select]:\n\
            not a call\n\
            goroutine 4 [select]:\n\
            main.leak()\n";
        let (mut detector, _) = scripted(vec![MIXED]);
        let err = detector.find([LeakOption::MaxRetries(0)]).unwrap_err();
        assert_eq!(err.leak_report().unwrap().task_ids(), vec![TaskId(4)]);
    }
}

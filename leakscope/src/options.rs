//! Detection options
//!
//! Callers describe a detection with a list of [`LeakOption`] values. They are
//! applied in order onto a plain [`Options`], then validated for the entry
//! point that will use them:
//!
//! ```ignore
//! let options = Options::build([
//!     LeakOption::ignore_top_function("net/http.(*persistConn).readLoop"),
//!     LeakOption::MaxRetries(5),
//!     LeakOption::Pretty(true),
//! ])?;
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use regex::Regex;

use crate::detector::retry::{RetryFn, RetryPolicy};
use crate::domain::{ConfigError, TaskId, TaskStack};
use crate::filter::{TaskFilter, BUILTIN_RULES};

/// Cleanup callback run by the test-integration entry points once detection
/// is over, with the number of sampling attempts made.
pub type Cleanup = Box<dyn FnOnce(usize)>;

pub enum LeakOption {
    IgnoreTopFunction(String),
    IgnoreAnyFunction(String),
    IgnoreFunctionContaining(String),
    /// Regular expression, compiled when options are built.
    IgnoreFunctionMatching(String),
    IgnoreTasks(BTreeSet<TaskId>),
    IgnoreWith(Box<dyn Fn(&TaskStack) -> bool>),
    MaxRetries(usize),
    /// Switch to exponential backoff capped at this pause.
    MaxSleep(Duration),
    RetryPolicy(RetryPolicy),
    Pretty(bool),
    Cleanup(Cleanup),
}

impl LeakOption {
    pub fn ignore_top_function(name: impl Into<String>) -> Self {
        LeakOption::IgnoreTopFunction(name.into())
    }

    pub fn ignore_any_function(name: impl Into<String>) -> Self {
        LeakOption::IgnoreAnyFunction(name.into())
    }

    pub fn ignore_function_containing(text: impl Into<String>) -> Self {
        LeakOption::IgnoreFunctionContaining(text.into())
    }

    pub fn ignore_function_matching(pattern: impl Into<String>) -> Self {
        LeakOption::IgnoreFunctionMatching(pattern.into())
    }

    pub fn ignore_tasks(ids: impl IntoIterator<Item = TaskId>) -> Self {
        LeakOption::IgnoreTasks(ids.into_iter().collect())
    }

    pub fn ignore_with(predicate: impl Fn(&TaskStack) -> bool + 'static) -> Self {
        LeakOption::IgnoreWith(Box::new(predicate))
    }

    pub fn fixed_delay(max_retries: usize, delay: Duration) -> Self {
        LeakOption::RetryPolicy(RetryPolicy::Fixed { max_retries, delay })
    }

    pub fn backoff(max_retries: usize, max_sleep: Duration) -> Self {
        LeakOption::RetryPolicy(RetryPolicy::Backoff { max_retries, max_sleep })
    }

    pub fn retry_with(retry: impl FnMut(usize) -> bool + 'static) -> Self {
        let retry: RetryFn = Box::new(retry);
        LeakOption::RetryPolicy(RetryPolicy::Custom(retry))
    }

    pub fn cleanup(cleanup: impl FnOnce(usize) + 'static) -> Self {
        LeakOption::Cleanup(Box::new(cleanup))
    }
}

impl fmt::Debug for LeakOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeakOption::IgnoreTopFunction(s) => f.debug_tuple("IgnoreTopFunction").field(s).finish(),
            LeakOption::IgnoreAnyFunction(s) => f.debug_tuple("IgnoreAnyFunction").field(s).finish(),
            LeakOption::IgnoreFunctionContaining(s) => {
                f.debug_tuple("IgnoreFunctionContaining").field(s).finish()
            }
            LeakOption::IgnoreFunctionMatching(s) => f.debug_tuple("IgnoreFunctionMatching").field(s).finish(),
            LeakOption::IgnoreTasks(ids) => f.debug_tuple("IgnoreTasks").field(ids).finish(),
            LeakOption::IgnoreWith(_) => f.write_str("IgnoreWith(..)"),
            LeakOption::MaxRetries(n) => f.debug_tuple("MaxRetries").field(n).finish(),
            LeakOption::MaxSleep(d) => f.debug_tuple("MaxSleep").field(d).finish(),
            LeakOption::RetryPolicy(p) => f.debug_tuple("RetryPolicy").field(p).finish(),
            LeakOption::Pretty(b) => f.debug_tuple("Pretty").field(b).finish(),
            LeakOption::Cleanup(_) => f.write_str("Cleanup(..)"),
        }
    }
}

/// Which public entry point is about to use the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Find,
    FindPretty,
    VerifyNone,
    VerifyTestMain,
}

impl EntryPoint {
    fn accepts_cleanup(self) -> bool {
        matches!(self, EntryPoint::VerifyNone | EntryPoint::VerifyTestMain)
    }
}

/// Options of one detection call. Built once, read-only during retries.
#[derive(Default)]
pub struct Options {
    /// Caller filters in registration order, followed by the built-in rules.
    pub filters: Vec<TaskFilter>,
    pub retry: RetryPolicy,
    pub pretty: bool,
    pub cleanup: Option<Cleanup>,
}

impl Options {
    /// Apply `options` in order onto the defaults and append the built-in
    /// ignore rules.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPattern`] if a function pattern does not
    /// compile.
    pub fn build(options: impl IntoIterator<Item = LeakOption>) -> Result<Self, ConfigError> {
        let mut opts = Options::default();
        for option in options {
            opts.apply(option)?;
        }
        opts.filters.extend(BUILTIN_RULES.into_iter().map(TaskFilter::Builtin));
        Ok(opts)
    }

    fn apply(&mut self, option: LeakOption) -> Result<(), ConfigError> {
        match option {
            LeakOption::IgnoreTopFunction(name) => self.filters.push(TaskFilter::TopFunction(name)),
            LeakOption::IgnoreAnyFunction(name) => self.filters.push(TaskFilter::AnyFunction(name)),
            LeakOption::IgnoreFunctionContaining(text) => {
                self.filters.push(TaskFilter::FunctionContaining(text));
            }
            LeakOption::IgnoreFunctionMatching(pattern) => {
                let re = Regex::new(&pattern)
                    .map_err(|e| ConfigError::InvalidPattern { pattern: pattern.clone(), reason: e.to_string() })?;
                self.filters.push(TaskFilter::FunctionMatching(re));
            }
            LeakOption::IgnoreTasks(ids) => self.filters.push(TaskFilter::Tasks(ids)),
            LeakOption::IgnoreWith(predicate) => self.filters.push(TaskFilter::Custom(predicate)),
            LeakOption::MaxRetries(n) => self.retry.set_max_retries(n),
            LeakOption::MaxSleep(d) => self.retry.set_max_sleep(d),
            LeakOption::RetryPolicy(policy) => self.retry = policy,
            LeakOption::Pretty(pretty) => self.pretty = pretty,
            LeakOption::Cleanup(cleanup) => self.cleanup = Some(cleanup),
        }
        Ok(())
    }

    /// Reject combinations the entry point cannot honour.
    ///
    /// # Errors
    /// Returns [`ConfigError::CleanupNotSupported`] when a cleanup callback
    /// reaches an entry point without a teardown step.
    pub fn validate(&self, entry: EntryPoint) -> Result<(), ConfigError> {
        if self.cleanup.is_some() && !entry.accepts_cleanup() {
            return Err(ConfigError::CleanupNotSupported);
        }
        Ok(())
    }
}

/// Take the cleanup callback out of `options` so that it survives a build
/// that fails. The last one given wins, as in [`Options::build`].
pub fn split_cleanup(options: impl IntoIterator<Item = LeakOption>) -> (Vec<LeakOption>, Option<Cleanup>) {
    let mut cleanup = None;
    let rest = options
        .into_iter()
        .filter_map(|option| match option {
            LeakOption::Cleanup(c) => {
                cleanup = Some(c);
                None
            }
            other => Some(other),
        })
        .collect();
    (rest, cleanup)
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("filters", &self.filters)
            .field("retry", &self.retry)
            .field("pretty", &self.pretty)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

//! CLI argument definitions

use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

use crate::detector::DEFAULT_MAX_RETRIES;
use crate::domain::TaskId;
use crate::options::LeakOption;

#[derive(Parser, Debug)]
#[command(
    name = "leakscope",
    version,
    about = "Detect leaked goroutines in Go stack dumps",
    after_help = "\
EXAMPLES:
    leakscope goroutines.txt                         Check a dump file
    go test -run TestX 2>&1 | leakscope -            Check a dump read from stdin
    leakscope --command 'curl -s localhost:6060/debug/pprof/goroutine?debug=2' --pretty

EXIT CODES:
    0  no unexpected goroutines    1  leaks found
    2  usage error                 3  dump could not be read"
)]
pub struct Args {
    /// Goroutine dump file, re-read on every attempt ("-" reads stdin once)
    #[arg(value_name = "DUMP", conflicts_with = "command")]
    pub dump: Option<String>,

    /// Shell command printing a goroutine dump, run on every attempt
    #[arg(short, long, value_name = "CMD")]
    pub command: Option<String>,

    /// Ignore goroutines with this function on top of the stack
    #[arg(long = "ignore-top", value_name = "FUNCTION")]
    pub ignore_top: Vec<String>,

    /// Ignore goroutines with this function anywhere in the stack
    #[arg(long = "ignore-any", value_name = "FUNCTION")]
    pub ignore_any: Vec<String>,

    /// Ignore goroutines with a function name containing TEXT
    #[arg(long = "ignore-containing", value_name = "TEXT")]
    pub ignore_containing: Vec<String>,

    /// Ignore goroutines with a function name matching PATTERN
    #[arg(long = "ignore-regex", value_name = "PATTERN")]
    pub ignore_regex: Vec<String>,

    /// Ignore the goroutine with this ID
    #[arg(long = "ignore-id", value_name = "ID")]
    pub ignore_id: Vec<u64>,

    /// Retries before giving up [default: 20]
    #[arg(long, value_name = "N")]
    pub max_retries: Option<usize>,

    /// Fixed pause between retries, e.g. 10ms or 1s [default: 10ms]
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, conflicts_with = "max_sleep")]
    pub delay: Option<Duration>,

    /// Back off exponentially between retries, up to DURATION
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub max_sleep: Option<Duration>,

    /// Print the dependency graph report
    #[arg(long)]
    pub pretty: bool,

    /// Disable colors (also honours NO_COLOR)
    #[arg(long)]
    pub no_color: bool,

    /// Export leaks as JSON to FILE
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Detection options in the order the flags are applied: filters, then
    /// retry schedule, then retry bound.
    pub fn leak_options(&self) -> Vec<LeakOption> {
        let mut options: Vec<LeakOption> = Vec::new();
        options.extend(self.ignore_top.iter().map(LeakOption::ignore_top_function));
        options.extend(self.ignore_any.iter().map(LeakOption::ignore_any_function));
        options.extend(self.ignore_containing.iter().map(LeakOption::ignore_function_containing));
        options.extend(self.ignore_regex.iter().map(LeakOption::ignore_function_matching));
        if !self.ignore_id.is_empty() {
            options.push(LeakOption::ignore_tasks(self.ignore_id.iter().copied().map(TaskId)));
        }

        if let Some(delay) = self.delay {
            options.push(LeakOption::fixed_delay(DEFAULT_MAX_RETRIES, delay));
        }
        if let Some(max_sleep) = self.max_sleep {
            options.push(LeakOption::MaxSleep(max_sleep));
        }
        if let Some(n) = self.max_retries {
            options.push(LeakOption::MaxRetries(n));
        }
        options
    }
}

static RE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*(ns|us|µs|ms|s|m)?\s*$").expect("valid duration regex"));

/// Parse `250ms`, `2s`, `500us`, `1m`. A bare number is milliseconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let caps = RE_DURATION
        .captures(text)
        .ok_or_else(|| format!("invalid duration {text:?} (expected e.g. 100ms, 2s)"))?;
    let value: u64 = caps[1].parse().map_err(|e| format!("invalid duration {text:?}: {e}"))?;
    let duration = match caps.get(2).map(|m| m.as_str()) {
        Some("ns") => Duration::from_nanos(value),
        Some("us" | "µs") => Duration::from_micros(value),
        Some("s") => Duration::from_secs(value),
        Some("m") => Duration::from_secs(value.saturating_mul(60)),
        _ => Duration::from_millis(value),
    };
    Ok(duration)
}

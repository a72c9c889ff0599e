//! # leakscope - Goroutine Leak Detector
//!
//! leakscope finds goroutines that are still alive when they should not be.
//! It reads a goroutine dump (the text written by `runtime.Stack(buf, true)`
//! or served at `/debug/pprof/goroutine?debug=2`), drops everything that is
//! expected to be running, and retries for a while so that goroutines which
//! are merely shutting down get a chance to exit. Whatever is left is a leak.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Go program / dump file / command               │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ dump bytes (once per attempt)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     leakscope (This Crate)                      │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │     Dump     │──▶│    Parser    │──▶│    Filter    │         │
//! │  │  (sources)   │   │ (TaskStack)  │   │   (ignore)   │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │         ▲                                     │                 │
//! │         │ retry                               ▼                 │
//! │  ┌──────┴───────┐                     ┌──────────────┐          │
//! │  │   Detector   │◀────────────────────│   leftovers  │          │
//! │  │ (retry loop) │                     └──────────────┘          │
//! │  └──────┬───────┘                                               │
//! │         ▼                                                       │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Report    │   │    Graph     │   │    Export    │         │
//! │  │plain / pretty│──▶│  (creators)  │   │ (leaks.json) │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`dump`]: Where dump bytes come from, and line scanning with pushback
//!   - `source`: runtime capture with buffer growth, files, shell commands
//!   - `scanner`: line reader with one line of pushback
//!
//! - [`parser`]: Turn dump text into [`TaskStack`] records
//!   - Malformed stacks are isolated; parsing resumes at the next header
//!
//! - [`filter`]: Ordered ignore rules plus the built-in Go runtime rules
//!
//! - [`detector`]: The sample → filter → decide → retry loop
//!   - `retry`: fixed delay, exponential backoff or a custom function
//!   - `verify`: test-harness entry points
//!
//! ### Reporting Modules
//!
//! - [`report`]: Plain and pretty leak reports
//! - [`graph`]: Creator → created forest of the leaked goroutines
//! - [`export`]: JSON document for CI tooling
//!
//! ### Supporting Modules
//!
//! - [`options`]: Composable [`LeakOption`] values
//! - [`cli`]: Command-line argument parsing
//! - [`domain`]: Core types and structured errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Check a dump file, retrying while it is rewritten
//! leakscope goroutines.txt --pretty
//!
//! # Poll a live service until its background work is done
//! leakscope --command 'curl -s localhost:6060/debug/pprof/goroutine?debug=2' \
//!     --ignore-top 'net/http.(*persistConn).readLoop' --max-sleep 250ms
//! ```
//!
//! ```ignore
//! use leakscope::{LeakDetector, LeakOption, StaticDump};
//!
//! let mut detector = LeakDetector::new(StaticDump::new(dump));
//! detector.find([LeakOption::ignore_top_function("main.backgroundLoop")])?;
//! ```
//!
//! ## Key Concepts
//!
//! - **Goroutine dump**: headers `goroutine N [state]:` followed by call and
//!   location line pairs, ending with an optional `created by` frame
//! - **Self goroutine**: the goroutine running the check, always ignored
//! - **Creator**: the goroutine named in `created by ... in goroutine N`

pub mod cli;
pub mod detector;
pub mod domain;
pub mod dump;
pub mod export;
pub mod filter;
pub mod graph;
pub mod options;
pub mod parser;
pub mod report;

pub use detector::{verify_none, verify_test_main, Detection, LeakDetector, RetryPolicy, RunError, TestReporter};
pub use domain::{DetectError, Frame, TaskId, TaskStack};
pub use dump::{CommandDump, DumpSource, FileDump, RuntimeDump, StaticDump};
pub use options::{LeakOption, Options};
pub use report::{LeakReport, Palette};

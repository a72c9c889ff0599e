//! Goroutine dump parser
//!
//! Turns the text produced by `runtime.Stack(buf, true)` (or
//! `/debug/pprof/goroutine?debug=2`) into [`TaskStack`] records.
//!
//! # Format
//!
//! ```text
//! goroutine 18 [chan receive]:
//! main.worker(0xc00001c0c0)
//! 	/app/main.go:21 +0x2c
//! ...3 frames elided...
//! created by main.start in goroutine 1
//! 	/app/main.go:14 +0x4f
//!
//! goroutine 1 [running]:
//! ...
//! ```
//!
//! A malformed stack never stops the parse. Its error is recorded, the partial
//! stack is dropped, and scanning resumes at the next header. Only a failure
//! of the underlying reader is fatal.

pub mod line;

use std::io::BufRead;

use log::warn;

use crate::domain::{Frame, ParseErrors, ScanError, StackParseError, TaskStack};
use crate::dump::DumpScanner;
use line::{is_elided, is_header, is_location, parse_call, parse_header};

/// Result of parsing one dump: every stack that parsed, plus every error.
#[derive(Debug, Clone, Default)]
pub struct ParsedDump {
    pub stacks: Vec<TaskStack>,
    pub errors: ParseErrors,
}

impl ParsedDump {
    /// The joined per-stack errors, if any stack failed.
    pub fn error(&self) -> Option<&ParseErrors> {
        (!self.errors.is_empty()).then_some(&self.errors)
    }
}

/// Parses a complete dump held in memory.
///
/// # Errors
/// Only reader failures, which cannot happen for an in-memory slice in
/// practice. Malformed stacks are reported in [`ParsedDump::errors`].
pub fn parse_dump(bytes: &[u8]) -> Result<ParsedDump, ScanError> {
    StackParser::new(bytes).parse()
}

enum Failure {
    Scan(ScanError),
    Stack(StackParseError),
}

impl From<ScanError> for Failure {
    fn from(err: ScanError) -> Self {
        Failure::Scan(err)
    }
}

impl From<StackParseError> for Failure {
    fn from(err: StackParseError) -> Self {
        Failure::Stack(err)
    }
}

/// Streaming parser over any buffered reader.
pub struct StackParser<R> {
    scan: DumpScanner<R>,
    stacks: Vec<TaskStack>,
    errors: Vec<StackParseError>,
}

impl<R: BufRead> StackParser<R> {
    pub fn new(reader: R) -> Self {
        Self { scan: DumpScanner::new(reader), stacks: Vec::new(), errors: Vec::new() }
    }

    /// Parse the whole input.
    ///
    /// # Errors
    /// Returns [`ScanError`] if the reader fails.
    pub fn parse(mut self) -> Result<ParsedDump, ScanError> {
        while self.scan.scan()? {
            let line = self.scan.text().into_owned();
            if !is_header(&line) {
                // Ancestor tracebacks and the remains of a rejected stack.
                continue;
            }

            match self.parse_stack(&line) {
                Ok(stack) => self.stacks.push(stack),
                Err(Failure::Stack(err)) => {
                    warn!("skipping malformed stack: {err}");
                    self.errors.push(err);
                }
                Err(Failure::Scan(err)) => return Err(err),
            }
        }

        Ok(ParsedDump { stacks: self.stacks, errors: ParseErrors(self.errors) })
    }

    /// Parses one stack. `header` is its first line:
    ///
    /// ```text
    /// goroutine 123 [runnable]:
    /// ```
    fn parse_stack(&mut self, header: &str) -> Result<TaskStack, Failure> {
        let (id, state) = parse_header(header)?;

        let mut frames = Vec::new();
        let mut full_text = String::new();

        while self.scan.scan()? {
            let line = self.scan.text().into_owned();
            if is_header(&line) {
                // Start of the next stack; leave it for the outer loop.
                self.scan.unscan();
                break;
            }

            full_text.push_str(&line);
            full_text.push('\n');

            // Blank lines usually end a stack, but the structure tells us
            // that anyway.
            if line.is_empty() || is_elided(&line) {
                continue;
            }

            let Some(call) = parse_call(&line) else {
                return Err(StackParseError::NoFunction { task: id, line }.into());
            };
            let function = call.function.to_string();
            let is_creator = call.is_creator;

            // The location line is optional. Only take it if it is indented;
            // anything else is left for the next iteration.
            let mut location = String::new();
            if self.scan.scan()? {
                if is_location(self.scan.bytes()) {
                    location = self.scan.text().into_owned();
                    full_text.push_str(&location);
                    full_text.push('\n');
                } else {
                    self.scan.unscan();
                }
            }

            frames.push(Frame { call: line, function, location, is_creator });

            // "created by" is the last frame of this goroutine. With
            // GODEBUG=tracebackancestors=N the creator's own traceback may
            // follow, but it belongs to another goroutine:
            //
            //   created by testing.(*T).Run in goroutine 1
            //           /usr/lib/go/src/testing/testing.go:1648 +0x3ad
            //   [originating from goroutine 1]:
            //   testing.(*T).Run(...)
            if is_creator {
                break;
            }
        }

        Ok(TaskStack::new(id, state, frames, full_text))
    }
}

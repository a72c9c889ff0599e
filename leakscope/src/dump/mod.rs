//! Dump acquisition and line scanning
//!
//! - `source`: where dump bytes come from (runtime capture, file, command)
//! - `scanner`: splitting those bytes into lines with one line of pushback

pub mod scanner;
pub mod source;

pub use scanner::DumpScanner;
pub use source::{capture_with_growth, CommandDump, DumpSource, FileDump, RuntimeDump, StaticDump};

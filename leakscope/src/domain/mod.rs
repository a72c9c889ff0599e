//! Domain model for leakscope
//!
//! This module re-exports the shared snapshot types from `leakscope-common`
//! and holds the structured errors of the detection pipeline.

pub mod errors;

// Re-export common types for convenience
pub use leakscope_common::{Frame, TaskId, TaskStack};

pub use errors::{ConfigError, DetectError, ExportError, ParseErrors, ScanError, StackParseError};

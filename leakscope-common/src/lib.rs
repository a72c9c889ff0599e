//! # Shared Data Structures (Parser ↔ Detector ↔ Export)
//!
//! Plain data types describing one snapshot of live goroutines. They are
//! produced by the dump parser in `leakscope`, consumed by the filter engine
//! and dependency graph, and serialized by the report exporter when the
//! `serde` feature is enabled.
//!
//! ## Key Types
//!
//! - [`TaskId`] - Goroutine identifier, unique within one dump
//! - [`Frame`] - One call-site entry of a stack
//! - [`TaskStack`] - One goroutine's captured state
//!
//! A `TaskStack` is built once per snapshot and never mutated afterwards.

use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Dump Format Constants
// ============================================================================

/// Prefix of every goroutine header line:
///
/// ```text
/// goroutine 643 [runnable]:
/// ```
pub const HEADER_PREFIX: &str = "goroutine ";

/// Prefix of the trailer frame naming the goroutine that spawned this one.
pub const CREATOR_PREFIX: &str = "created by ";

/// Marker that separates the creator function from the creator goroutine id
/// on a "created by" line (Go 1.21+).
pub const CREATOR_TASK_MARKER: &str = " in goroutine";

/// Initial buffer size used when capturing a dump from the runtime.
///
/// The buffer doubles until the whole dump fits.
pub const DEFAULT_DUMP_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Identifiers
// ============================================================================

/// Goroutine ID
///
/// Non-negative and unique among the goroutines of a single dump. IDs are
/// reused by the runtime across dumps, so they must not be compared across
/// snapshots taken far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        TaskId(id)
    }
}

// ============================================================================
// Stack Entries
// ============================================================================

/// A single entry in a goroutine's stack.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    /// The call line exactly as printed by the runtime, arguments included.
    pub call: String,

    /// Function identifier parsed out of `call`.
    ///
    /// - Ordinary frames: everything before the last `(`
    /// - Creator frames: the text after `created by ` and before ` in goroutine`
    pub function: String,

    /// Location line (`\t/path/file.go:123 +0x1f`), empty when the dump
    /// omitted it.
    pub location: String,

    /// True only for the trailing "created by" frame.
    pub is_creator: bool,
}

impl Frame {
    /// Ordinary call frame.
    pub fn new(call: impl Into<String>, function: impl Into<String>, location: impl Into<String>) -> Self {
        Self { call: call.into(), function: function.into(), location: location.into(), is_creator: false }
    }

    /// "created by" trailer frame.
    pub fn creator(call: impl Into<String>, function: impl Into<String>, location: impl Into<String>) -> Self {
        Self { call: call.into(), function: function.into(), location: location.into(), is_creator: true }
    }

    /// Goroutine ID embedded in a creator call line, if any.
    ///
    /// `created by main.spawn in goroutine 7` yields `Some(TaskId(7))`.
    /// Ordinary frames and pre-1.21 creator lines yield `None`.
    #[must_use]
    pub fn creator_task_id(&self) -> Option<TaskId> {
        if !self.is_creator {
            return None;
        }
        let (_, rest) = self.call.split_once(HEADER_PREFIX)?;
        let digits: &str = {
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            &rest[..end]
        };
        digits.parse().ok().map(TaskId)
    }
}

// ============================================================================
// Goroutine Stack
// ============================================================================

/// One goroutine's captured state.
///
/// Invariant: at most one frame is a creator frame, and if present it is the
/// last one. [`TaskStack::new`] enforces this by dropping anything after the
/// first creator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaskStack {
    id: TaskId,
    /// e.g. `running`, `chan receive`, `select, 2 minutes`
    state: String,
    first_function: String,
    functions: BTreeSet<String>,
    frames: Vec<Frame>,
    full_text: String,
}

impl TaskStack {
    /// Assemble a stack from its frames. `first_function` and the function
    /// set are derived from the non-creator frames.
    pub fn new(id: TaskId, state: impl Into<String>, mut frames: Vec<Frame>, full_text: impl Into<String>) -> Self {
        if let Some(pos) = frames.iter().position(|f| f.is_creator) {
            frames.truncate(pos + 1);
        }

        let mut first_function = String::new();
        let mut functions = BTreeSet::new();
        for frame in frames.iter().filter(|f| !f.is_creator) {
            if first_function.is_empty() {
                first_function.clone_from(&frame.function);
            }
            functions.insert(frame.function.clone());
        }

        Self { id, state: state.into(), first_function, functions, frames, full_text: full_text.into() }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Name of the top-most function on the stack.
    pub fn first_function(&self) -> &str {
        &self.first_function
    }

    /// All function identifiers on the stack, creator excluded.
    pub fn functions(&self) -> &BTreeSet<String> {
        &self.functions
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Verbatim body text of the stack, one `\n`-terminated line per
    /// consumed dump line.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Reports whether `name` appears anywhere on the stack.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// The "created by" frame, if the dump included one.
    pub fn creator_frame(&self) -> Option<&Frame> {
        self.frames.last().filter(|f| f.is_creator)
    }

    /// ID of the goroutine that spawned this one.
    pub fn source_task_id(&self) -> Option<TaskId> {
        self.creator_frame().and_then(Frame::creator_task_id)
    }
}

impl fmt::Display for TaskStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Goroutine {} in state {}, with {} on top of the stack:\n{}",
            self.id, self.state, self.first_function, self.full_text
        )
    }
}

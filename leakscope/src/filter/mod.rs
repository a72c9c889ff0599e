//! Deciding which goroutines are not leaks
//!
//! A [`FilterEngine`] applies, in order:
//!
//! 1. the caller's own goroutine (always ignored),
//! 2. caller filters, in the order they were added,
//! 3. the [`BuiltinRule`]s.
//!
//! Evaluation stops at the first match. Filters only read the stack.

pub mod builtin;

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

use crate::domain::{Frame, TaskId, TaskStack};
pub use builtin::{BuiltinRule, BUILTIN_RULES};

/// Custom ignore predicate.
pub type Predicate = Box<dyn Fn(&TaskStack) -> bool>;

/// One ignore rule. Every variant except `Custom` is a shorthand for a
/// predicate over the stack's function names or ID.
pub enum TaskFilter {
    /// Ignore if this is the top-most function.
    TopFunction(String),
    /// Ignore if this exact function appears anywhere on the stack.
    AnyFunction(String),
    /// Ignore if any function name contains this text.
    FunctionContaining(String),
    /// Ignore if any function name matches this pattern.
    FunctionMatching(Regex),
    /// Ignore these goroutine IDs (typically a snapshot taken before a test).
    Tasks(BTreeSet<TaskId>),
    Custom(Predicate),
    Builtin(BuiltinRule),
}

impl TaskFilter {
    pub fn ignores(&self, stack: &TaskStack) -> bool {
        match self {
            TaskFilter::TopFunction(name) => stack.first_function() == name.as_str(),
            TaskFilter::AnyFunction(name) => stack.has_function(name),
            TaskFilter::FunctionContaining(needle) => {
                stack.functions().iter().any(|f| f.contains(needle.as_str()))
            }
            TaskFilter::FunctionMatching(re) => stack.functions().iter().any(|f| re.is_match(f)),
            TaskFilter::Tasks(ids) => ids.contains(&stack.id()),
            TaskFilter::Custom(predicate) => predicate(stack),
            TaskFilter::Builtin(rule) => rule.ignores(stack),
        }
    }

    /// Whether this filter names the function of `frame`. Used to highlight
    /// frames in reports; ID, custom and built-in filters never match.
    pub fn matches_frame(&self, frame: &Frame) -> bool {
        if frame.is_creator {
            return false;
        }
        match self {
            TaskFilter::TopFunction(name) | TaskFilter::AnyFunction(name) => &frame.function == name,
            TaskFilter::FunctionContaining(needle) => frame.function.contains(needle.as_str()),
            TaskFilter::FunctionMatching(re) => re.is_match(&frame.function),
            TaskFilter::Tasks(_) | TaskFilter::Custom(_) | TaskFilter::Builtin(_) => false,
        }
    }
}

impl fmt::Debug for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFilter::TopFunction(name) => f.debug_tuple("TopFunction").field(name).finish(),
            TaskFilter::AnyFunction(name) => f.debug_tuple("AnyFunction").field(name).finish(),
            TaskFilter::FunctionContaining(s) => f.debug_tuple("FunctionContaining").field(s).finish(),
            TaskFilter::FunctionMatching(re) => f.debug_tuple("FunctionMatching").field(&re.as_str()).finish(),
            TaskFilter::Tasks(ids) => f.debug_tuple("Tasks").field(ids).finish(),
            TaskFilter::Custom(_) => f.write_str("Custom(..)"),
            TaskFilter::Builtin(rule) => f.debug_tuple("Builtin").field(rule).finish(),
        }
    }
}

/// Filters applied to one detection call.
#[derive(Debug)]
pub struct FilterEngine<'a> {
    self_id: Option<TaskId>,
    filters: &'a [TaskFilter],
}

impl<'a> FilterEngine<'a> {
    /// `self_id` is the goroutine performing the check, if it is part of the
    /// inspected dump.
    pub fn new(self_id: Option<TaskId>, filters: &'a [TaskFilter]) -> Self {
        Self { self_id, filters }
    }

    pub fn is_ignored(&self, stack: &TaskStack) -> bool {
        if Some(stack.id()) == self.self_id {
            return true;
        }
        self.filters.iter().any(|f| f.ignores(stack))
    }

    /// Keep only the stacks that are not ignored, preserving order.
    pub fn retain(&self, stacks: Vec<TaskStack>) -> Vec<TaskStack> {
        stacks.into_iter().filter(|s| !self.is_ignored(s)).collect()
    }

    /// Whether any caller filter names this frame's function.
    pub fn highlights(&self, frame: &Frame) -> bool {
        self.filters.iter().any(|f| f.matches_frame(frame))
    }
}

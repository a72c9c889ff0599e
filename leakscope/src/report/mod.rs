//! Leak reports
//!
//! Two renderings of the goroutines that survived every retry:
//!
//! - **plain**: one `Goroutine N in state S, ...` block per goroutine
//! - **pretty**: the creator forest, then a labelled block per goroutine
//!   with frames matched by caller filters highlighted
//!
//! Captured dump text is always inserted as data, never used as a format
//! string, so `%` or `{}` inside a stack cannot corrupt the output.

pub mod palette;

use std::collections::BTreeMap;
use std::fmt;

use leakscope_common::CREATOR_PREFIX;
use serde::Serialize;

use crate::domain::{TaskId, TaskStack};
use crate::filter::FilterEngine;
use crate::graph::{render_forest, DependencyGraph};
pub use palette::Palette;

/// Header of the plain report.
pub const PLAIN_HEADER: &str = "found unexpected goroutines:\n";

/// The goroutines still alive once retries ran out.
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    /// Sampling attempts made, the final one included.
    pub attempts: usize,
    pub stacks: Vec<TaskStack>,
    /// Rendered report text.
    pub message: String,
}

impl LeakReport {
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.stacks.iter().map(TaskStack::id).collect()
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub fn plain_message(stacks: &[TaskStack]) -> String {
    let mut out = String::from(PLAIN_HEADER);
    for stack in stacks {
        out.push_str(&stack.to_string());
    }
    out
}

pub fn pretty_message(stacks: &[TaskStack], engine: &FilterEngine<'_>, palette: Palette) -> String {
    let labels: BTreeMap<TaskId, String> = stacks
        .iter()
        .filter_map(|s| s.creator_frame().map(|frame| (s.id(), frame.call.clone())))
        .collect();
    let graph = DependencyGraph::from_stacks(stacks);

    let mut out = String::from("[*] found unexpected goroutines:\n");
    out.push_str(&format!("[-] {}:\n\n", palette.label("Dependency Graph")));
    out.push_str(&render_forest(&graph, &labels));
    out.push_str(&format!("\n-> {}:\n\n", palette.section("Goroutines")));
    for stack in stacks {
        out.push_str(&pretty_stack(stack, engine, palette));
    }
    out
}

/// One goroutine's labelled block.
pub fn pretty_stack(stack: &TaskStack, engine: &FilterEngine<'_>, palette: Palette) -> String {
    let mut out = String::from("\n");
    let field = |out: &mut String, name: &str, value: String| {
        out.push_str(&palette.label(name));
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    };

    field(&mut out, "Goroutine ID", palette.value(&stack.id().to_string()));
    field(&mut out, "State", palette.value(stack.state()));

    if let Some(creator) = stack.creator_frame() {
        let source = stack.source_task_id().map_or_else(|| "unknown".to_string(), |id| id.to_string());
        let created_at = creator.call.strip_prefix(CREATOR_PREFIX).unwrap_or(&creator.call);
        field(&mut out, "Source Goroutine ID", palette.origin(&source));
        field(&mut out, "Created At", palette.origin(created_at));
        field(&mut out, "Location", palette.origin(creator.location.trim()));
    } else {
        field(&mut out, "First Function", palette.origin(stack.first_function()));
    }

    out.push_str(&palette.label("Full Stack"));
    out.push_str(": \n\n");

    for frame in stack.frames() {
        let paint = |text: &str| if engine.highlights(frame) { palette.highlight(text) } else { text.to_string() };
        out.push_str(&paint(&frame.call));
        out.push('\n');
        if !frame.location.is_empty() {
            out.push_str(&paint(&frame.location));
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

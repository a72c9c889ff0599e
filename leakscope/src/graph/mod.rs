//! Creator → created dependency graph
//!
//! Explains *why* a leaked goroutine exists by showing which goroutine
//! spawned it. Built fresh for every report from the surviving stacks.
//!
//! ```text
//! └── 1
//!     ├── 7 (created by main.startWorkers in goroutine 1)
//!     │   └── 12 (created by main.worker in goroutine 7)
//!     └── 8 (created by main.startWorkers in goroutine 1)
//! ```

pub mod render;

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{TaskId, TaskStack};
pub use render::render_forest;

/// Adjacency of the creator relation. Every node has an entry, possibly with
/// no children, and every child list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    children: BTreeMap<TaskId, Vec<TaskId>>,
}

impl DependencyGraph {
    /// Build from `task → creator`. A `None` creator means the dump did not
    /// name one; such tasks become roots.
    pub fn build(mapping: &BTreeMap<TaskId, Option<TaskId>>) -> Self {
        let mut children: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();

        for (&task, &creator) in mapping {
            children.entry(task).or_default();
            if let Some(creator) = creator {
                children.entry(creator).or_default().push(task);
            }
        }

        for list in children.values_mut() {
            list.sort_unstable();
        }

        Self { children }
    }

    /// Build from the creator frames of `stacks`.
    pub fn from_stacks(stacks: &[TaskStack]) -> Self {
        Self::build(&creator_mapping(stacks))
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// All nodes in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.children.keys().copied()
    }

    pub fn children(&self, task: TaskId) -> &[TaskId] {
        self.children.get(&task).map_or(&[][..], Vec::as_slice)
    }

    /// Nodes that are nobody's child, in ascending order.
    pub fn roots(&self) -> Vec<TaskId> {
        let spawned: BTreeSet<TaskId> = self.children.values().flatten().copied().collect();
        self.nodes().filter(|task| !spawned.contains(task)).collect()
    }
}

/// `task → creator` for every stack.
pub fn creator_mapping(stacks: &[TaskStack]) -> BTreeMap<TaskId, Option<TaskId>> {
    stacks.iter().map(|s| (s.id(), s.source_task_id())).collect()
}

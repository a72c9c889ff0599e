//! Tree rendering of a [`DependencyGraph`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use super::DependencyGraph;
use crate::domain::TaskId;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const BLANK: &str = "    ";

/// Render the graph as an indented forest, one node per line.
///
/// Roots come first in ascending order; any node still unvisited afterwards
/// (only possible with cycles) starts a tree of its own. A node reached a
/// second time is printed as a leaf marked `(see above)` and not descended
/// into, so every node and edge is handled once.
///
/// `labels` annotates nodes, typically with the "created by" call text.
pub fn render_forest(graph: &DependencyGraph, labels: &BTreeMap<TaskId, String>) -> String {
    let mut out = String::new();
    let mut visited = BTreeSet::new();

    for root in graph.roots() {
        render_node(&mut out, graph, labels, &mut visited, root, "", true);
    }
    for node in graph.nodes() {
        if !visited.contains(&node) {
            render_node(&mut out, graph, labels, &mut visited, node, "", true);
        }
    }
    out
}

fn render_node(
    out: &mut String,
    graph: &DependencyGraph,
    labels: &BTreeMap<TaskId, String>,
    visited: &mut BTreeSet<TaskId>,
    node: TaskId,
    prefix: &str,
    is_last: bool,
) {
    let connector = if is_last { LAST_BRANCH } else { BRANCH };
    let _ = write!(out, "{prefix}{connector}{node}");
    if let Some(label) = labels.get(&node).filter(|l| !l.is_empty()) {
        let _ = write!(out, " ({label})");
    }

    if !visited.insert(node) {
        out.push_str(" (see above)\n");
        return;
    }
    out.push('\n');

    let child_prefix = format!("{prefix}{}", if is_last { BLANK } else { PIPE });
    let children = graph.children(node);
    for (i, &child) in children.iter().enumerate() {
        render_node(out, graph, labels, visited, child, &child_prefix, i + 1 == children.len());
    }
}

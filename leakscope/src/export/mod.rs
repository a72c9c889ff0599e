//! JSON export of leak reports
//!
//! Writes a machine-readable document for CI dashboards and later
//! comparison:
//!
//! ```text
//! {
//!   "version": "0.1.0",
//!   "attempts": 21,
//!   "leaks": [ { "id": 7, "state": "chan receive", "source": 1, ... } ],
//!   "edges": [ [1, 7] ]
//! }
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ExportError, Frame, TaskId};
use crate::graph::DependencyGraph;
use crate::report::LeakReport;

/// One leaked goroutine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedLeak {
    pub id: TaskId,
    pub state: String,
    pub first_function: String,
    /// Creator goroutine, when the dump named one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<TaskId>,
    pub frames: Vec<Frame>,
    pub full_text: String,
}

/// Export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedReport {
    pub version: String,
    pub attempts: usize,
    pub leaks: Vec<ExportedLeak>,
    /// `[creator, created]` pairs of the dependency graph, sorted.
    pub edges: Vec<(TaskId, TaskId)>,
}

impl ExportedReport {
    pub fn from_report(report: &LeakReport) -> Self {
        let leaks = report
            .stacks
            .iter()
            .map(|stack| ExportedLeak {
                id: stack.id(),
                state: stack.state().to_string(),
                first_function: stack.first_function().to_string(),
                source: stack.source_task_id(),
                frames: stack.frames().to_vec(),
                full_text: stack.full_text().to_string(),
            })
            .collect();

        let graph = DependencyGraph::from_stacks(&report.stacks);
        let edges = graph
            .nodes()
            .flat_map(|parent| graph.children(parent).iter().map(move |&child| (parent, child)))
            .collect();

        Self { version: env!("CARGO_PKG_VERSION").to_string(), attempts: report.attempts, leaks, edges }
    }
}

/// Write `report` as pretty-printed JSON.
///
/// # Errors
/// Serialization or write failures of `writer`.
pub fn write_json<W: Write>(report: &LeakReport, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, &ExportedReport::from_report(report))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write `report` as JSON to `path`, replacing any existing file.
///
/// # Errors
/// [`ExportError::WriteFailed`] if the file cannot be created, otherwise as
/// [`write_json`].
pub fn export_to_file(report: &LeakReport, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)
        .map_err(|source| ExportError::WriteFailed { path: path.display().to_string(), source })?;
    write_json(report, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dump;

    fn report() -> LeakReport {
        let dump = "goroutine 7 [chan receive]:\n\
            main.worker(0x1)\n\
            \t/w.go:3 +0x1\n\
            created by main.start in goroutine 1\n\
            \t/w.go:9 +0x2\n\
            \n\
            goroutine 9 [select]:\n\
            main.idle()\n\
            \t/w.go:20\n";
        let stacks = parse_dump(dump.as_bytes()).unwrap().stacks;
        LeakReport { attempts: 3, stacks, message: String::new() }
    }

    #[test]
    fn test_exported_document() {
        let doc = ExportedReport::from_report(&report());
        assert_eq!(doc.attempts, 3);
        assert_eq!(doc.leaks.len(), 2);
        assert_eq!(doc.leaks[0].source, Some(TaskId(1)));
        assert_eq!(doc.leaks[1].source, None);
        assert_eq!(doc.leaks[0].first_function, "main.worker");
        assert_eq!(doc.edges, vec![(TaskId(1), TaskId(7))]);
    }

    #[test]
    fn test_write_json_is_parseable() {
        let mut buf = Vec::new();
        write_json(&report(), &mut buf).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["attempts"], 3);
        assert_eq!(value["leaks"][0]["id"], 7);
        assert_eq!(value["leaks"][0]["frames"][1]["is_creator"], true);
        assert!(value["leaks"][1].get("source").is_none());

        let back: ExportedReport = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, ExportedReport::from_report(&report()));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaks.json");
        export_to_file(&report(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"full_text\""));
    }

    #[test]
    fn test_export_to_missing_directory() {
        let err = export_to_file(&report(), Path::new("/nonexistent/leakscope/out.json")).unwrap_err();
        assert!(matches!(err, ExportError::WriteFailed { .. }));
    }
}

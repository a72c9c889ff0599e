use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use leakscope::dump::{CommandDump, FileDump, StaticDump};
use leakscope::export::{write_json, ExportedReport};
use leakscope::parser::parse_dump;
use leakscope::report::Palette;
use leakscope::{verify_none, DetectError, LeakDetector, LeakOption, TaskId};

const HTTP_LEAK: &str = include_str!("fixtures/http_leak.txt");
const CLEAN: &str = include_str!("fixtures/clean.txt");
const MALFORMED: &str = include_str!("fixtures/malformed.txt");

/// Own stack of the test goroutine in every fixture.
const SELF: &str = "goroutine 1 [running]:\nmain.TestServer(0xc000102340)\n\t/src/app/server_test.go:42 +0x65\n";

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn detector(dump: &str) -> LeakDetector<StaticDump> {
    LeakDetector::new(StaticDump::new(dump).with_current(SELF))
        .with_palette(Palette::plain())
        .with_sleeper(|_| {})
}

fn leaked_ids(err: &DetectError) -> Vec<TaskId> {
    err.leak_report().expect("expected a leak report").task_ids()
}

#[test]
fn test_fixture_parses_cleanly() {
    let parsed = parse_dump(HTTP_LEAK.as_bytes()).unwrap();
    assert!(parsed.error().is_none(), "unexpected parse errors: {:?}", parsed.error());

    let ids: Vec<u64> = parsed.stacks.iter().map(|s| s.id().0).collect();
    assert_eq!(ids, vec![1, 6, 12, 18, 19, 33, 34]);

    let worker = &parsed.stacks[5];
    assert_eq!(worker.state(), "chan receive, 2 minutes");
    assert_eq!(worker.first_function(), "main.worker");
    assert!(worker.has_function("main.runWorker"));
    assert!(!worker.has_function("main.startWorkers"));
    assert_eq!(worker.source_task_id(), Some(TaskId(1)));
    assert!(worker.full_text().contains("...2 frames elided..."));
}

#[test]
fn test_builtin_rules_hide_runtime_goroutines() {
    let err = detector(HTTP_LEAK).find([LeakOption::MaxRetries(0)]).unwrap_err();
    assert_eq!(leaked_ids(&err), vec![TaskId(18), TaskId(19), TaskId(33), TaskId(34)]);
}

#[test]
fn test_caller_filters() {
    let mut detector = detector(HTTP_LEAK);
    let err = detector
        .find([LeakOption::MaxRetries(0), LeakOption::ignore_function_containing("net/http.")])
        .unwrap_err();
    assert_eq!(leaked_ids(&err), vec![TaskId(33), TaskId(34)]);

    detector
        .find([
            LeakOption::ignore_function_matching(r"^net/http\.\(\*persistConn\)"),
            LeakOption::ignore_any_function("main.worker"),
            LeakOption::ignore_top_function("time.Sleep"),
        ])
        .unwrap();
}

#[test]
fn test_clean_dump() {
    detector(CLEAN).find(Vec::new()).unwrap();
}

#[test]
fn test_pretty_report_graph() {
    let err = detector(HTTP_LEAK).find_pretty([LeakOption::MaxRetries(0)]).unwrap_err();
    let text = err.to_string();

    let expected_forest = "\
└── 1
    └── 33 (created by main.startWorkers in goroutine 1)
        └── 34 (created by main.worker in goroutine 33)
└── 17
    ├── 18 (created by net/http.(*Transport).dialConn in goroutine 17)
    └── 19 (created by net/http.(*Transport).dialConn in goroutine 17)
";
    assert!(text.starts_with("[*] found unexpected goroutines:\n[-] Dependency Graph:\n\n"));
    assert!(text.contains(expected_forest), "forest missing from:\n{text}");
    assert!(text.contains("\n-> Goroutines:\n\n"));
    assert!(text.contains("Created At: net/http.(*Transport).dialConn in goroutine 17\n"));
    assert!(text.contains("Location: /src/app/workers.go:14 +0x4f\n"));
}

#[test]
fn test_malformed_stacks_are_isolated() {
    let parsed = parse_dump(MALFORMED.as_bytes()).unwrap();
    assert_eq!(parsed.errors.len(), 2);

    let err = detector(MALFORMED).find_pretty([LeakOption::MaxRetries(0)]).unwrap_err();
    assert_eq!(leaked_ids(&err), vec![TaskId(41)]);
    let text = err.to_string();
    assert!(text.contains("Source Goroutine ID: unknown\n"));
    assert!(text.contains("└── 41 (created by main.spawn)\n"));
}

#[test]
fn test_file_source_sees_goroutines_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("goroutines.txt");
    std::fs::write(&path, HTTP_LEAK).unwrap();

    let slept = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&slept);
    let rewrite = path.clone();
    let mut detector = LeakDetector::new(FileDump::new(&path))
        .with_palette(Palette::plain())
        .with_sleeper(move |d| {
            record.borrow_mut().push(d);
            std::fs::write(&rewrite, CLEAN).unwrap();
        });

    // Without an own stack goroutine 1 counts too, so ignore it by ID.
    detector
        .find([
            LeakOption::ignore_tasks([TaskId(1)]),
            LeakOption::fixed_delay(5, Duration::from_millis(3)),
        ])
        .unwrap();
    assert_eq!(*slept.borrow(), vec![Duration::from_millis(3)]);
}

#[test]
fn test_command_source() {
    let command = format!("cat '{}'", fixture_path("http_leak.txt").display());
    let mut detector = LeakDetector::new(CommandDump::new(command)).with_palette(Palette::plain());
    let err = detector
        .find([LeakOption::MaxRetries(0), LeakOption::ignore_tasks([TaskId(1)])])
        .unwrap_err();
    assert_eq!(leaked_ids(&err).len(), 4);
}

#[test]
fn test_failing_command_is_a_scan_error() {
    let mut detector = LeakDetector::new(CommandDump::new("exit 7")).with_sleeper(|_| {});
    assert!(matches!(detector.find(Vec::new()), Err(DetectError::Scan(_))));
}

#[test]
fn test_ignore_current_before_test() {
    let before = CLEAN;
    let mut detector = detector(before);
    let snapshot = detector.ignore_current().unwrap();

    let mut after = LeakDetector::new(StaticDump::new(HTTP_LEAK).with_current(SELF))
        .with_palette(Palette::plain())
        .with_sleeper(|_| {});
    let err = after.find([snapshot, LeakOption::MaxRetries(0)]).unwrap_err();
    assert_eq!(leaked_ids(&err).len(), 4);
}

#[test]
fn test_verify_none_with_retries() {
    let attempts = Rc::new(RefCell::new(None));
    let record = Rc::clone(&attempts);
    let mut errors: Vec<String> = Vec::new();
    verify_none(
        &mut detector(HTTP_LEAK),
        &mut errors,
        [LeakOption::MaxRetries(2), LeakOption::cleanup(move |n| *record.borrow_mut() = Some(n))],
    );
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Goroutine 33 in state chan receive, 2 minutes, with main.worker on top of the stack:"));
    assert_eq!(*attempts.borrow(), Some(3));
}

#[test]
fn test_export_of_detected_leaks() {
    let err = detector(HTTP_LEAK).find([LeakOption::MaxRetries(0)]).unwrap_err();
    let report = err.leak_report().unwrap();

    let mut buf = Vec::new();
    write_json(report, &mut buf).unwrap();
    let doc: ExportedReport = serde_json::from_slice(&buf).unwrap();
    assert_eq!(doc.attempts, 1);
    assert_eq!(doc.leaks.len(), 4);
    assert!(doc.edges.contains(&(TaskId(33), TaskId(34))));
    assert!(doc.edges.contains(&(TaskId(17), TaskId(18))));
}

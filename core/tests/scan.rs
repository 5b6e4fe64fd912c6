use std::fs;

use jtg_core::{NullReporter, Policy, Problem, ScanError, Scanner};
use tempfile::TempDir;

fn scanner_for(projects: &[&str]) -> Scanner {
    let policy = Policy {
        projects: projects.iter().map(|p| p.to_string()).collect(),
        ..Policy::default()
    };
    Scanner::new(&policy).unwrap()
}

#[tokio::test]
async fn scan_without_references_needs_no_tracker() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.js");
    fs::write(&file, "// TODO: name this\nlet x = 1;\n").unwrap();

    let scanner = scanner_for(&["PM"]);
    let report = scanner.scan(&[file], None, &NullReporter).await.unwrap();
    assert!(report.problems.is_empty());
    assert!(report.fetch_failures.is_empty());
    assert!(report.file_errors.is_empty());
}

#[tokio::test]
async fn out_of_project_references_need_no_tracker() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.js");
    fs::write(&file, "// TODO: see ABC-1\n").unwrap();

    let scanner = scanner_for(&["PM"]);
    let report = scanner.scan(&[file], None, &NullReporter).await.unwrap();
    assert!(report.problems.is_empty());
}

#[tokio::test]
async fn in_project_references_without_a_tracker_are_fatal() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.js");
    fs::write(&file, "// TODO: see PM-1\n").unwrap();

    let scanner = scanner_for(&["PM"]);
    let result = scanner.scan(&[file], None, &NullReporter).await;
    assert!(matches!(result, Err(ScanError::TrackerRequired)));
}

#[tokio::test]
async fn broken_files_do_not_stop_their_siblings() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.js");
    let invalid = dir.path().join("invalid.js");
    let good = dir.path().join("good.js");
    fs::write(&invalid, "function {\n").unwrap();
    fs::write(&good, "// FIXME name this\n").unwrap();

    let policy = Policy {
        issue_required: true,
        ..Policy::default()
    };
    let scanner = Scanner::new(&policy).unwrap();
    let report = scanner
        .scan(&[missing, invalid, good], None, &NullReporter)
        .await
        .unwrap();

    assert_eq!(report.file_errors.len(), 2);
    assert_eq!(report.problems.len(), 1);
    assert!(matches!(report.problems[0], Problem::MissingIssue { .. }));
}

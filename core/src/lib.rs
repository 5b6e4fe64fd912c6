//! Jira todo guard core engine.
//! Scans source comments for TODO/FIXME markers that reference tracker
//! issues, resolves each referenced issue once, and reports markers whose
//! issue has a disallowed status or type, or no issue key at all.

mod extract;
mod grammar;
mod jira;

pub use extract::{extract_comments, Comment, Dialect, ExtractError, Location};
pub use grammar::{
    PatternError, TodoGrammar, TodoMatch, DEFAULT_ISSUE_PATTERN, DEFAULT_TODO_PATTERN,
};
pub use jira::{ConfigError, FetchFailure, IssueStatus, JiraClient, JiraConfig};

use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allow-lists and flags controlling which todo references are acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub projects: Vec<String>,
    pub allowed_statuses: Vec<u32>,
    pub allowed_issue_types: Vec<u32>,
    pub issue_required: bool,
    pub todo_pattern: String,
    pub issue_pattern: String,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            allowed_statuses: vec![1],
            allowed_issue_types: vec![1, 3, 4, 5],
            issue_required: false,
            todo_pattern: DEFAULT_TODO_PATTERN.to_string(),
            issue_pattern: DEFAULT_ISSUE_PATTERN.to_string(),
        }
    }
}

/// A todo marker that names a tracker issue.
///
/// The same key may legitimately appear in several references; each one is
/// a distinct source location.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssueReference {
    pub key: String,
    pub project: String,
    pub number: u64,
    pub file: PathBuf,
    pub location: Location,
    pub source_text: String,
}

/// A todo marker whose trailing text names no tracker issue.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IncompleteTodo {
    pub file: PathBuf,
    pub location: Location,
    pub source_text: String,
}

/// Raw parse output, in discovery order and not yet project-filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoRecord {
    Reference(IssueReference),
    Incomplete(IncompleteTodo),
}

/// One policy violation tied to one source location.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Problem {
    StatusForbidden {
        issue: IssueReference,
        status: IssueStatus,
    },
    TypeForbidden {
        issue: IssueReference,
        status: IssueStatus,
    },
    MissingIssue {
        todo: IncompleteTodo,
    },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::StatusForbidden { issue, status } => write!(
                f,
                "{}:{} has a todo for issue {} (issue status: \"{}\")",
                issue.file.display(),
                issue.location.line,
                issue.key,
                status.name
            ),
            Problem::TypeForbidden { issue, status } => write!(
                f,
                "{}:{} has a todo for issue {} with disallowed issue type {}",
                issue.file.display(),
                issue.location.line,
                issue.key,
                status.issue_type
            ),
            Problem::MissingIssue { todo } => write!(
                f,
                "{}:{} has a todo without an issue reference: \"{}\"",
                todo.file.display(),
                todo.location.line,
                todo.source_text
            ),
        }
    }
}

/// Sink for informational and warning diagnostics.
///
/// The scanner reports per-file statistics and per-fetch failures through
/// it but never depends on it for control flow.
pub trait Reporter {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}

/// Reporter that swallows everything.
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Why a single file could not be scanned. Sibling files are unaffected.
#[derive(Debug, Error)]
pub enum FileErrorKind {
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug)]
pub struct FileError {
    pub file: PathBuf,
    pub error: FileErrorKind,
}

/// Fatal error for the whole run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("issue references were found but no tracker connection is configured")]
    TrackerRequired,
}

/// Everything found in one file, already filtered to configured projects.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileScan {
    pub references: Vec<IssueReference>,
    pub incomplete: Vec<IncompleteTodo>,
}

/// Outcome of a full scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub problems: Vec<Problem>,
    pub fetch_failures: Vec<FetchFailure>,
    pub file_errors: Vec<FileError>,
}

/// Policy compiled for reuse across files.
pub struct Scanner {
    grammar: TodoGrammar,
    projects: HashSet<String>,
    allowed_statuses: HashSet<u32>,
    allowed_issue_types: HashSet<u32>,
    issue_required: bool,
}

impl Scanner {
    pub fn new(policy: &Policy) -> Result<Self, PatternError> {
        let grammar = TodoGrammar::new(&policy.todo_pattern, &policy.issue_pattern)?;
        Ok(Self {
            grammar,
            projects: policy.projects.iter().cloned().collect(),
            allowed_statuses: policy.allowed_statuses.iter().copied().collect(),
            allowed_issue_types: policy.allowed_issue_types.iter().copied().collect(),
            issue_required: policy.issue_required,
        })
    }

    /// Parse one unit of source text into todo records in discovery order.
    pub fn parse_source(
        &self,
        file: &Path,
        source: &str,
        dialect: Dialect,
    ) -> Result<Vec<TodoRecord>, ExtractError> {
        let comments = extract_comments(source, dialect)?;
        let mut records = Vec::new();
        for comment in comments {
            for matched in self.grammar.scan(&comment.text) {
                records.push(match matched {
                    TodoMatch::Issue {
                        key,
                        project,
                        number,
                        source_text,
                    } => TodoRecord::Reference(IssueReference {
                        key,
                        project,
                        number,
                        file: file.to_path_buf(),
                        location: comment.location,
                        source_text,
                    }),
                    TodoMatch::Bare { source_text } => TodoRecord::Incomplete(IncompleteTodo {
                        file: file.to_path_buf(),
                        location: comment.location,
                        source_text,
                    }),
                });
            }
        }
        Ok(records)
    }

    /// Keep references whose project is configured; markers without a key
    /// always pass. Out-of-project references are dropped here, before any
    /// status lookup can happen for them.
    pub fn filter(&self, records: Vec<TodoRecord>) -> FileScan {
        let mut scan = FileScan::default();
        for record in records {
            match record {
                TodoRecord::Reference(reference) => {
                    if self.projects.contains(&reference.project) {
                        scan.references.push(reference);
                    }
                }
                TodoRecord::Incomplete(todo) => scan.incomplete.push(todo),
            }
        }
        scan
    }

    /// Judge one file's filtered references against fetched statuses.
    ///
    /// A key missing from the map means its lookup failed; that failure is
    /// surfaced separately and must not count as a violation. A forbidden
    /// issue type takes precedence over a forbidden status.
    ///
    /// Problems come out reference violations first, then missing-issue
    /// records, each group in discovery order, mirroring the partitioned
    /// shape of [`FileScan`].
    pub fn evaluate(
        &self,
        scan: &FileScan,
        statuses: &HashMap<String, IssueStatus>,
    ) -> Vec<Problem> {
        let mut problems = Vec::new();
        for reference in &scan.references {
            let Some(status) = statuses.get(&reference.key) else {
                continue;
            };
            if !self.allowed_issue_types.contains(&status.issue_type) {
                problems.push(Problem::TypeForbidden {
                    issue: reference.clone(),
                    status: status.clone(),
                });
            } else if !self.allowed_statuses.contains(&status.id) {
                problems.push(Problem::StatusForbidden {
                    issue: reference.clone(),
                    status: status.clone(),
                });
            }
        }
        if self.issue_required {
            for todo in &scan.incomplete {
                problems.push(Problem::MissingIssue { todo: todo.clone() });
            }
        }
        problems
    }

    /// Scan a set of files end to end: parse every file, resolve every
    /// unique issue key once, and judge each reference against the policy.
    ///
    /// Unreadable or unparseable files are recorded in the report and do
    /// not stop their siblings. The tracker is only required once at least
    /// one in-project reference exists.
    pub async fn scan(
        &self,
        files: &[PathBuf],
        tracker: Option<&JiraClient>,
        reporter: &dyn Reporter,
    ) -> Result<ScanReport, ScanError> {
        if self.projects.is_empty() {
            reporter.warn("no projects configured; issue references will not be checked");
        }

        let mut report = ScanReport::default();
        let mut scans = Vec::new();
        for file in files {
            reporter.info(&format!("processing {}", file.display()));
            let source = match fs::read_to_string(file) {
                Ok(source) => source,
                Err(err) => {
                    report.file_errors.push(FileError {
                        file: file.clone(),
                        error: err.into(),
                    });
                    continue;
                }
            };
            let records = match self.parse_source(file, &source, Dialect::from_path(file)) {
                Ok(records) => records,
                Err(err) => {
                    report.file_errors.push(FileError {
                        file: file.clone(),
                        error: err.into(),
                    });
                    continue;
                }
            };
            let total = records
                .iter()
                .filter(|record| matches!(record, TodoRecord::Reference(_)))
                .count();
            let scan = self.filter(records);
            reporter.info(&format!(
                "{}: {} todos with issues of which {} belong to configured projects, {} without a key",
                file.display(),
                total,
                scan.references.len(),
                scan.incomplete.len()
            ));
            scans.push(scan);
        }

        let keys = unique_keys(&scans);
        let statuses = if keys.is_empty() {
            HashMap::new()
        } else {
            let tracker = tracker.ok_or(ScanError::TrackerRequired)?;
            let (statuses, failures) = tracker.fetch_statuses(&keys).await;
            for failure in &failures {
                reporter.warn(&format!(
                    "could not resolve {}: {}",
                    failure.key, failure.reason
                ));
            }
            report.fetch_failures = failures;
            statuses
        };

        for scan in &scans {
            report.problems.extend(self.evaluate(scan, &statuses));
        }
        Ok(report)
    }
}

/// Deduplicate issue keys across files, preserving first-seen order.
///
/// However many references share a key, its status is looked up once.
pub fn unique_keys<'a>(scans: impl IntoIterator<Item = &'a FileScan>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for scan in scans {
        for reference in &scan.references {
            if seen.insert(reference.key.clone()) {
                keys.push(reference.key.clone());
            }
        }
    }
    keys
}

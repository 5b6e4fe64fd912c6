//! Two-stage todo grammar.
//!
//! An outer pattern recognises a todo/fixme marker and captures its trailing
//! text; an inner pattern scans that text for issue keys. Both patterns can
//! be overridden through the policy as long as they keep the named captures
//! (`text` for the outer stage, `project` and `number` for the inner one).

use regex::Regex;
use thiserror::Error;

/// Matches a marker token, optionally decorated with a stray `*` and
/// trailing `:` or `!`, and captures the rest of the line.
pub const DEFAULT_TODO_PATTERN: &str =
    r"(?i)\*?\s*\b(?:todo|fixme)\b[:!]?[^\S\r\n]*(?P<text>[^\r\n]*)";

/// Matches a `PROJECT-NUMBER` issue key inside a marker's trailing text.
pub const DEFAULT_ISSUE_PATTERN: &str = r"(?P<project>[A-Z][A-Z_]*)-(?P<number>\d+)";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {stage} pattern: {source}")]
    Invalid {
        stage: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("the {stage} pattern is missing the named capture `{name}`")]
    MissingCapture {
        stage: &'static str,
        name: &'static str,
    },
}

/// One recognised todo marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoMatch {
    /// The marker's trailing text referenced a tracker issue.
    Issue {
        key: String,
        project: String,
        number: u64,
        source_text: String,
    },
    /// A marker with no resolvable issue key in its trailing text.
    Bare { source_text: String },
}

/// Compiled two-stage pattern grammar, reused across files.
pub struct TodoGrammar {
    todo: Regex,
    issue: Regex,
}

impl TodoGrammar {
    pub fn new(todo_pattern: &str, issue_pattern: &str) -> Result<Self, PatternError> {
        let todo = compile("todo", todo_pattern)?;
        let issue = compile("issue", issue_pattern)?;
        require_capture(&todo, "todo", "text")?;
        require_capture(&issue, "issue", "project")?;
        require_capture(&issue, "issue", "number")?;
        Ok(Self { todo, issue })
    }

    /// Scan one comment body for todo markers.
    ///
    /// Every outer match yields at least one record: one per issue key in
    /// its trailing text, or a single bare match when the text names none.
    pub fn scan(&self, comment: &str) -> Vec<TodoMatch> {
        let mut found = Vec::new();
        for outer in self.todo.captures_iter(comment) {
            let source_text = outer
                .get(0)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .trim()
                .to_string();
            let text = outer.name("text").map(|m| m.as_str()).unwrap_or("");

            let before = found.len();
            for inner in self.issue.captures_iter(text) {
                let project = match inner.name("project") {
                    Some(m) => m.as_str().to_string(),
                    None => continue,
                };
                let digits = match inner.name("number") {
                    Some(m) => m.as_str(),
                    None => continue,
                };
                let number: u64 = match digits.parse() {
                    Ok(number) => number,
                    // A digit run too long for u64 still names an issue;
                    // saturate instead of dropping the reference.
                    Err(_) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                        u64::MAX
                    }
                    Err(_) => continue,
                };
                found.push(TodoMatch::Issue {
                    key: format!("{project}-{digits}"),
                    project,
                    number,
                    source_text: source_text.clone(),
                });
            }
            if found.len() == before {
                found.push(TodoMatch::Bare {
                    source_text: source_text.clone(),
                });
            }
        }
        found
    }
}

fn compile(stage: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::Invalid { stage, source })
}

fn require_capture(
    regex: &Regex,
    stage: &'static str,
    name: &'static str,
) -> Result<(), PatternError> {
    if regex.capture_names().any(|n| n == Some(name)) {
        Ok(())
    } else {
        Err(PatternError::MissingCapture { stage, name })
    }
}

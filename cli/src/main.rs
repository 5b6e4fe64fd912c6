use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use clap::{ArgAction, Parser};
use console::style;
use globset::{Glob, GlobSet, GlobSetBuilder};
use jtg_core::{
    FetchFailure, JiraClient, JiraConfig, Policy, Problem, Reporter, ScanReport, Scanner,
};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Jira todo guard CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "jtg",
    about = "Fail builds whose TODOs reference stale Jira issues."
)]
struct Args {
    /// Path to config file (YAML).
    #[arg(long, default_value = "jira-todo.yml")]
    config: PathBuf,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Per-file progress output.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Files or directories to scan.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,

    /// Project keys to check (comma-separated). Overrides the config file.
    #[arg(long, value_delimiter = ',', value_name = "PROJ[,PROJ]")]
    projects: Vec<String>,

    /// Allowed status ids (comma-separated). Overrides the config file.
    #[arg(long, value_delimiter = ',', value_name = "ID[,ID]")]
    allowed_statuses: Vec<u32>,

    /// Allowed issue type ids (comma-separated). Overrides the config file.
    #[arg(long, value_delimiter = ',', value_name = "ID[,ID]")]
    allowed_issue_types: Vec<u32>,

    /// Treat todos without an issue key as problems.
    #[arg(long, action = ArgAction::SetTrue)]
    issue_required: bool,

    /// Override the todo marker pattern.
    #[arg(long, value_name = "REGEX")]
    todo_pattern: Option<String>,

    /// Override the issue key pattern.
    #[arg(long, value_name = "REGEX")]
    issue_pattern: Option<String>,

    /// Jira base URL (falls back to the config file, then JIRA_URL).
    #[arg(long, value_name = "URL")]
    jira_url: Option<String>,

    /// Jira username (falls back to the config file, then JIRA_USERNAME).
    #[arg(long, value_name = "USER")]
    jira_username: Option<String>,

    /// Jira password (falls back to the config file, then JIRA_PASSWORD).
    #[arg(long, value_name = "PASS")]
    jira_password: Option<String>,
}

/// On-disk configuration: the policy plus tracker connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(flatten)]
    policy: Policy,
    jira: JiraConfig,
    ignore_globs: Vec<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            jira: JiraConfig::default(),
            ignore_globs: vec![
                "**/node_modules/**".into(),
                "**/dist/**".into(),
                "**/build/**".into(),
                "**/.git/**".into(),
            ],
        }
    }
}

#[derive(Debug, Serialize)]
struct FileErrorReport {
    file: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct OutputReport<'a> {
    files_scanned: usize,
    problems: &'a [Problem],
    fetch_failures: &'a [FetchFailure],
    file_errors: Vec<FileErrorReport>,
}

struct ConsoleReporter {
    verbose: bool,
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        if self.verbose {
            println!("{}", style(message).dim());
        }
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {}", style("warning:").yellow().bold(), message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run(Args::parse()).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let policy = merge_policy(config.policy.clone(), &args);
    let jira = merge_jira(config.jira.clone(), &args);

    let scanner = Scanner::new(&policy).context("invalid todo/issue pattern")?;
    let tracker = if jira.is_configured() {
        Some(JiraClient::new(&jira).context("incomplete tracker configuration")?)
    } else {
        None
    };

    let ignore = build_ignore_set(&config.ignore_globs)?;
    let files = collect_files(&args.paths, ignore.as_ref());

    let reporter = ConsoleReporter {
        verbose: args.verbose,
    };
    let report = scanner.scan(&files, tracker.as_ref(), &reporter).await?;

    if args.json {
        print_json(files.len(), &report)?;
    } else {
        print_human(files.len(), &report);
    }

    if !report.problems.is_empty() || !report.file_errors.is_empty() {
        process::exit(1);
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn merge_policy(mut policy: Policy, args: &Args) -> Policy {
    if !args.projects.is_empty() {
        policy.projects = args.projects.clone();
    }
    if !args.allowed_statuses.is_empty() {
        policy.allowed_statuses = args.allowed_statuses.clone();
    }
    if !args.allowed_issue_types.is_empty() {
        policy.allowed_issue_types = args.allowed_issue_types.clone();
    }
    if args.issue_required {
        policy.issue_required = true;
    }
    if let Some(pattern) = &args.todo_pattern {
        policy.todo_pattern = pattern.clone();
    }
    if let Some(pattern) = &args.issue_pattern {
        policy.issue_pattern = pattern.clone();
    }
    policy
}

fn merge_jira(mut jira: JiraConfig, args: &Args) -> JiraConfig {
    if let Some(url) = &args.jira_url {
        jira.url = Some(url.clone());
    }
    if let Some(username) = &args.jira_username {
        jira.username = Some(username.clone());
    }
    if let Some(password) = &args.jira_password {
        jira.password = Some(password.clone());
    }
    jira.url = jira.url.or_else(|| env::var("JIRA_URL").ok());
    jira.username = jira.username.or_else(|| env::var("JIRA_USERNAME").ok());
    jira.password = jira.password.or_else(|| env::var("JIRA_PASSWORD").ok());
    jira
}

fn build_ignore_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("bad ignore glob `{pattern}`"))?);
    }
    Ok(Some(builder.build()?))
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Expand the given paths into a sorted list of scannable source files.
fn collect_files(paths: &[PathBuf], ignore: Option<&GlobSet>) -> Vec<PathBuf> {
    let ignored = |path: &Path| ignore.map(|set| set.is_match(path)).unwrap_or(false);
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            // Explicitly named files bypass the extension filter.
            if !ignored(path) {
                files.push(path.clone());
            }
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
            let candidate = entry.path();
            if entry.file_type().is_file() && is_source_file(candidate) && !ignored(candidate) {
                files.push(candidate.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn print_human(files_scanned: usize, report: &ScanReport) {
    for err in &report.file_errors {
        eprintln!(
            "{} {}: {}",
            style("error:").red().bold(),
            err.file.display(),
            err.error
        );
    }
    if !report.problems.is_empty() {
        println!("{}", style("Problems:").bold());
        for problem in &report.problems {
            println!("  - {problem}");
        }
    }
    println!(
        "{} files scanned, {} problems, {} unresolved lookups",
        files_scanned,
        report.problems.len(),
        report.fetch_failures.len()
    );
}

fn print_json(files_scanned: usize, report: &ScanReport) -> anyhow::Result<()> {
    let output = OutputReport {
        files_scanned,
        problems: &report.problems,
        fetch_failures: &report.fetch_failures,
        file_errors: report
            .file_errors
            .iter()
            .map(|err| FileErrorReport {
                file: err.file.display().to_string(),
                message: err.error.to_string(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

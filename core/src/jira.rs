//! Jira status lookups with bounded request fan-out.

use std::collections::HashMap;

use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on simultaneously outstanding tracker requests.
const MAX_IN_FLIGHT: usize = 3;

/// Current status and type of a tracker issue.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssueStatus {
    pub id: u32,
    pub issue_type: u32,
    pub name: String,
}

/// One failed lookup. The batch keeps going; the key stays unresolved.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetchFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("jira.{0} is required to resolve issue statuses")]
    Missing(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Tracker connection settings as they appear in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl JiraConfig {
    /// True when any connection field is set at all.
    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.username.is_some() || self.password.is_some()
    }
}

/// Read-only client for the tracker's issue-by-key endpoint.
pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl JiraClient {
    /// Validates that all connection settings are present before any
    /// network activity happens.
    pub fn new(config: &JiraConfig) -> Result<Self, ConfigError> {
        let base_url = config.url.clone().ok_or(ConfigError::Missing("url"))?;
        let username = config
            .username
            .clone()
            .ok_or(ConfigError::Missing("username"))?;
        let password = config
            .password
            .clone()
            .ok_or(ConfigError::Missing("password"))?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn issue_url(&self, key: &str) -> String {
        format!("{}/rest/api/2/issue/{}", self.base_url, key)
    }

    /// Resolve each key to a status, or record why it could not be resolved.
    ///
    /// Keys are expected to be pre-deduplicated; each is attempted exactly
    /// once with at most `MAX_IN_FLIGHT` requests outstanding. A failed
    /// lookup never aborts the rest of the batch, so the returned map may
    /// simply lack entries for the failed keys.
    pub async fn fetch_statuses(
        &self,
        keys: &[String],
    ) -> (HashMap<String, IssueStatus>, Vec<FetchFailure>) {
        let mut statuses = HashMap::new();
        let mut failures = Vec::new();

        let mut lookups = stream::iter(keys.iter().cloned().map(|key| async move {
            let outcome = self.fetch_one(&key).await;
            (key, outcome)
        }))
        .buffer_unordered(MAX_IN_FLIGHT);

        while let Some((key, outcome)) = lookups.next().await {
            match outcome {
                Ok(status) => {
                    statuses.insert(key, status);
                }
                Err(reason) => failures.push(FetchFailure { key, reason }),
            }
        }

        (statuses, failures)
    }

    async fn fetch_one(&self, key: &str) -> Result<IssueStatus, String> {
        let response = self
            .client
            .get(self.issue_url(key))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|err| format!("request error: {err}"))?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(format!("tracker responded with HTTP {http_status}"));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| format!("failed to read response body: {err}"))?;
        parse_issue_body(&body)
    }
}

/// Decode the tracker's issue payload.
///
/// The tracker reports application errors as an `errorMessages` array in
/// place of issue data; that text is surfaced in the failure reason.
fn parse_issue_body(body: &[u8]) -> Result<IssueStatus, String> {
    let doc: IssueDoc = serde_json::from_slice(body)
        .map_err(|err| format!("invalid JSON in tracker response: {err}"))?;

    if let Some(messages) = doc.error_messages {
        return Err(match messages.first() {
            Some(message) => format!("tracker error: {message}"),
            None => "tracker error with no message".to_string(),
        });
    }

    let fields = doc
        .fields
        .ok_or_else(|| "tracker response is missing `fields`".to_string())?;
    let id = parse_numeric_id("status id", &fields.status.id)?;
    let issue_type = parse_numeric_id("issue type id", &fields.issuetype.id)?;
    Ok(IssueStatus {
        id,
        issue_type,
        name: fields.status.name,
    })
}

fn parse_numeric_id(what: &str, raw: &str) -> Result<u32, String> {
    raw.parse()
        .map_err(|_| format!("tracker returned a non-numeric {what}: `{raw}`"))
}

#[derive(Deserialize)]
struct IssueDoc {
    #[serde(rename = "errorMessages")]
    error_messages: Option<Vec<String>>,
    fields: Option<IssueFields>,
}

#[derive(Deserialize)]
struct IssueFields {
    status: StatusDoc,
    issuetype: IssueTypeDoc,
}

#[derive(Deserialize)]
struct StatusDoc {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct IssueTypeDoc {
    id: String,
}

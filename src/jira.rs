use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::JiraConfig;

/// A JIRA issue as returned by the REST v2 API.
///
/// Every field is optional: the tracker omits or nulls fields freely
/// depending on project configuration, and shaping must never fail on that.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub fields: JiraFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraFields {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<JiraUser>,
    pub reporter: Option<JiraUser>,
    pub status: Option<Named>,
    pub priority: Option<Named>,
    #[serde(rename = "issuetype")]
    pub issue_type: Option<Named>,
    pub resolution: Option<Named>,
    pub components: Option<Vec<Named>>,
    #[serde(rename = "versions")]
    pub affected_versions: Option<Vec<Named>>,
    #[serde(rename = "fixVersions")]
    pub fix_versions: Option<Vec<Named>>,
    pub created: Option<String>,
    pub updated: Option<String>,
    #[serde(rename = "customfield_11203")]
    pub architecture_component: Option<Vec<CustomOption>>,
    #[serde(rename = "customfield_11204")]
    pub bug_cause: Option<CustomOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraUser {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Any `{ "name": ... }` object: status, priority, issue type, version, component.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

/// A select-list custom field value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomOption {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

/// Read-only view of the issue tracker used by the plugins.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch a single issue. Returns `None` when the tracker reports it missing.
    async fn issue(&self, key: &str) -> Result<Option<JiraIssue>>;

    /// Run a JQL query, returning at most `max_results` issues in tracker order.
    async fn search(&self, jql: &str, max_results: u32) -> Result<Vec<JiraIssue>>;
}

/// Fields requested from search; `search/jql` returns bare ids without them.
const SEARCH_FIELDS: &str = "summary,description,assignee,reporter,status,priority,issuetype,\
resolution,components,versions,fixVersions,created,updated,customfield_11203,customfield_11204";

pub struct JiraClient {
    client: reqwest::Client,
    api_url: String,
    search_url: String,
    user: String,
    auth: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Self {
        let api_url = format!("{}/rest/api/2", config.server.trim_end_matches('/'));
        Self {
            client: reqwest::Client::new(),
            search_url: format!("{}/{}", api_url, config.search_path.trim_matches('/')),
            api_url,
            user: config.user.clone(),
            auth: config.auth.clone(),
        }
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn issue(&self, key: &str) -> Result<Option<JiraIssue>> {
        let url = format!("{}/issue/{}", self.api_url, key);
        debug!("Fetching JIRA issue: {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.auth))
            .send()
            .await
            .with_context(|| format!("Failed to send request for JIRA issue {}", key))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("JIRA issue {} not found", key);
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("JIRA API error ({}): {}", status, error_body);
        }

        let issue = response
            .json()
            .await
            .with_context(|| format!("Failed to parse JIRA issue {}", key))?;
        Ok(Some(issue))
    }

    async fn search(&self, jql: &str, max_results: u32) -> Result<Vec<JiraIssue>> {
        debug!("Searching JIRA: {}", jql);

        let response = self
            .client
            .get(&self.search_url)
            .basic_auth(&self.user, Some(&self.auth))
            .query(&[
                ("jql", jql.to_string()),
                ("maxResults", max_results.to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
            ])
            .send()
            .await
            .context("Failed to send JIRA search request")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("JIRA API error ({}): {}", status, error_body);
        }

        let search: SearchResponse = response
            .json()
            .await
            .context("Failed to parse JIRA search response")?;

        let mut issues = search.issues;
        issues.truncate(max_results as usize);
        Ok(issues)
    }
}

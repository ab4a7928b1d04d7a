use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::Plugin;
use crate::config::JiraConfig;
use crate::jira::IssueTracker;
use crate::matcher::{ReferenceKind, TrackerReference};
use crate::reply;
use crate::shaper::{self, IssueRecord, Style};

/// Markers that mean the text is already JQL and should be sent as-is.
const JQL_MARKERS: [&str; 9] = [
    "=", "~", "<", ">", " in ", " is ", " was ", " order by ", "(",
];

/// `rs jira <query>`: the most recently updated matches, short form.
pub struct JiraQuery {
    tracker: Arc<dyn IssueTracker>,
    config: JiraConfig,
}

impl JiraQuery {
    pub fn new(tracker: Arc<dyn IssueTracker>, config: JiraConfig) -> Self {
        Self { tracker, config }
    }
}

/// Quote a value as a JQL string literal.
pub fn jql_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn looks_like_jql(text: &str) -> bool {
    let padded = format!(" {} ", text.to_lowercase());
    JQL_MARKERS.iter().any(|marker| padded.contains(marker))
}

/// Turn the text after `rs jira` into JQL.
///
/// JQL passes through. Otherwise `@user` filters on assignee,
/// `team:<name>` filters on team membership, and the remaining words
/// become a full-text search. Results are always newest-updated first.
pub fn build_jql(text: &str, team_aliases: &HashMap<String, String>) -> String {
    let text = text.trim();
    let mut jql = if looks_like_jql(text) {
        text.to_string()
    } else {
        let mut clauses = Vec::new();
        let mut words = Vec::new();
        for token in text.split_whitespace() {
            if let Some(user) = token.strip_prefix('@').filter(|u| !u.is_empty()) {
                clauses.push(format!("assignee = {}", jql_string(user)));
            } else if let Some(team) = token.strip_prefix("team:").filter(|t| !t.is_empty()) {
                let team = team_aliases.get(team).map(String::as_str).unwrap_or(team);
                clauses.push(format!("assignee in membersOf({})", jql_string(team)));
            } else {
                words.push(token);
            }
        }
        if !words.is_empty() {
            clauses.push(format!("text ~ {}", jql_string(&words.join(" "))));
        }
        clauses.join(" AND ")
    };

    if !jql.to_lowercase().contains("order by") {
        jql.push_str(" ORDER BY updated DESC");
    }
    jql
}

#[async_trait]
impl Plugin for JiraQuery {
    fn name(&self) -> &'static str {
        "jira_query"
    }

    fn accepts(&self, reference: &TrackerReference) -> bool {
        reference.kind == ReferenceKind::Query && reference.context_is("jira")
    }

    async fn resolve(&self, references: &[TrackerReference]) -> Result<Option<String>> {
        let Some(reference) = references.first() else {
            return Ok(None);
        };

        let jql = build_jql(&reference.value, &self.config.team_aliases);
        info!("Running JIRA query: {}", jql);

        let issues = self
            .tracker
            .search(&jql, self.config.max_query_results)
            .await?;

        let lines = issues
            .iter()
            .take(self.config.max_query_results as usize)
            .map(|issue| {
                let record = IssueRecord::from_issue(issue, self.config.browse_url(&issue.key));
                shaper::shape(&record, Style::Short)
            });
        Ok(reply::emit(lines))
    }
}

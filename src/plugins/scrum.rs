use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, Weekday};
use std::sync::Arc;
use tracing::info;

use super::jira_query::jql_string;
use super::Plugin;
use crate::config::JiraConfig;
use crate::jira::IssueTracker;
use crate::matcher::{ReferenceKind, TrackerReference};
use crate::reply;
use crate::shaper::{self, IssueRecord};

const RESOLVED_HEADER: &str = "*Team recently closed/resolved:*";
const IN_PROGRESS_HEADER: &str = "*And folks are currently working on:*";
const SCRUM_MAX_RESULTS: u32 = 50;
const ISSUE_TYPES: &str = r#"issuetype in (Bug, "Engineering Story", Story)"#;

/// `rs scrum <team>`: what the team closed lately and what is in flight.
pub struct Scrum {
    tracker: Arc<dyn IssueTracker>,
    config: JiraConfig,
    today: fn() -> NaiveDate,
}

impl Scrum {
    pub fn new(tracker: Arc<dyn IssueTracker>, config: JiraConfig) -> Self {
        Self {
            tracker,
            config,
            today: || Local::now().date_naive(),
        }
    }

    #[cfg(test)]
    fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn team_name<'a>(&'a self, team: &'a str) -> &'a str {
        self.config
            .team_aliases
            .get(team)
            .map(String::as_str)
            .unwrap_or(team)
    }

    async fn section(&self, header: &str, jql: &str) -> Result<Vec<String>> {
        let issues = self.tracker.search(jql, SCRUM_MAX_RESULTS).await?;
        let mut lines = vec![header.to_string()];
        lines.extend(issues.iter().map(|issue| {
            shaper::scrum_line(&IssueRecord::from_issue(
                issue,
                self.config.browse_url(&issue.key),
            ))
        }));
        Ok(lines)
    }
}

/// Days to look back for resolved work: a weekend widens the window.
pub fn resolved_lag_days(today: NaiveDate) -> u32 {
    match today.weekday() {
        Weekday::Sat | Weekday::Sun => 3,
        _ => 1,
    }
}

pub fn recently_resolved_query(team: &str, lag_days: u32) -> String {
    format!(
        "{} AND status in (Resolved, Closed) AND updated >= -{}d AND \
         assignee in membersOf({}) ORDER BY assignee, updated DESC",
        ISSUE_TYPES,
        lag_days,
        jql_string(team)
    )
}

pub fn in_progress_query(team: &str) -> String {
    format!(
        "{} AND status = \"In Progress\" AND resolution = Unresolved AND \
         assignee in membersOf({}) ORDER BY assignee, updated DESC",
        ISSUE_TYPES,
        jql_string(team)
    )
}

#[async_trait]
impl Plugin for Scrum {
    fn name(&self) -> &'static str {
        "scrum"
    }

    fn accepts(&self, reference: &TrackerReference) -> bool {
        reference.kind == ReferenceKind::Query && reference.context_is("scrum")
    }

    async fn resolve(&self, references: &[TrackerReference]) -> Result<Option<String>> {
        let Some(reference) = references.first() else {
            return Ok(None);
        };

        let team = self.team_name(reference.value.trim());
        let lag = resolved_lag_days((self.today)());
        info!("Scrum report for team {} (lag {}d)", team, lag);

        let resolved = self
            .section(RESOLVED_HEADER, &recently_resolved_query(team, lag))
            .await?;
        let in_progress = self
            .section(IN_PROGRESS_HEADER, &in_progress_query(team))
            .await?;

        // headers alone mean neither query found anything
        if resolved.len() == 1 && in_progress.len() == 1 {
            return Ok(None);
        }
        Ok(reply::emit(resolved.into_iter().chain(in_progress)))
    }
}

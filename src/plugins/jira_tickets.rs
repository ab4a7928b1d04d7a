use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::Plugin;
use crate::config::JiraConfig;
use crate::jira::IssueTracker;
use crate::matcher::{ReferenceKind, TrackerReference};
use crate::reply;
use crate::shaper::{self, IssueRecord, Style};

/// Upper bound on tickets looked up for a single message
const MAX_TICKETS_PER_MESSAGE: usize = 5;

/// Ticket metadata for `TD-123` mentions and the `!TD-12345` shorthand.
/// `rs TD-123` asks for the long form.
pub struct JiraTickets {
    tracker: Arc<dyn IssueTracker>,
    config: JiraConfig,
}

impl JiraTickets {
    pub fn new(tracker: Arc<dyn IssueTracker>, config: JiraConfig) -> Self {
        Self { tracker, config }
    }

    async fn lookup(&self, reference: &TrackerReference) -> Result<Option<String>> {
        let Some(issue) = self.tracker.issue(&reference.value).await? else {
            debug!("No such ticket: {}", reference.value);
            return Ok(None);
        };

        let style = if reference.context_is("rs") {
            Style::Long
        } else {
            Style::Short
        };
        let record = IssueRecord::from_issue(&issue, self.config.browse_url(&issue.key));
        Ok(Some(shaper::shape(&record, style)))
    }
}

#[async_trait]
impl Plugin for JiraTickets {
    fn name(&self) -> &'static str {
        "jira_tickets"
    }

    fn accepts(&self, reference: &TrackerReference) -> bool {
        reference.kind == ReferenceKind::Ticket
    }

    async fn resolve(&self, references: &[TrackerReference]) -> Result<Option<String>> {
        let mut lines = Vec::new();
        for reference in references.iter().take(MAX_TICKETS_PER_MESSAGE) {
            if let Some(line) = self.lookup(reference).await? {
                lines.push(line);
            }
        }
        Ok(reply::emit(lines))
    }
}

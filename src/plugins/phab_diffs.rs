use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::Plugin;
use crate::config::PhabricatorConfig;
use crate::matcher::{ReferenceKind, TrackerReference};
use crate::phabricator::{LocalCommit, ReviewTool};
use crate::reply;

/// Only commits written against the revision template carry this.
pub const TEST_PLAN_MARKER: &str = "Test Plan:";
const REVIEWERS_PREFIX: &str = "Reviewers:";

/// Author and summary for `D1234` mentions. `ping D1234` also mentions
/// the reviewers.
pub struct PhabDiffs {
    review: Arc<dyn ReviewTool>,
    config: PhabricatorConfig,
}

impl PhabDiffs {
    pub fn new(review: Arc<dyn ReviewTool>, config: PhabricatorConfig) -> Self {
        Self { review, config }
    }

    async fn lookup(&self, reference: &TrackerReference) -> Result<Option<String>> {
        let tag = reference.value.as_str();
        let revision_id = tag.trim_start_matches('D');
        let diffs = self.review.query_diffs(revision_id).await?;

        let Some(commit) = templated_commit(diffs.iter().flat_map(|d| d.commits())) else {
            debug!("No templated commit for {}", tag);
            return Ok(None);
        };

        let mut line = format!(
            "<{}/{}|{}>: {} \n > {}",
            self.config.base_url(),
            tag,
            tag,
            commit.author.as_deref().unwrap_or_default(),
            commit.summary.as_deref().unwrap_or_default()
        );

        if reference.context_is("ping") {
            let message = commit.message.as_deref().unwrap_or_default();
            if let Some(mentions) = reviewer_mentions(message, &self.config.user_aliases) {
                line.push('\n');
                line.push_str(&mentions);
            }
        }

        Ok(Some(line))
    }
}

/// The newest commit whose message contains the test plan marker.
/// Commits are compared by time; ties keep the input order.
pub fn templated_commit<I>(commits: I) -> Option<LocalCommit>
where
    I: IntoIterator<Item = LocalCommit>,
{
    let mut candidates: Vec<LocalCommit> = commits
        .into_iter()
        .filter(|c| {
            c.message
                .as_deref()
                .is_some_and(|m| m.contains(TEST_PLAN_MARKER))
        })
        .collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(c.timestamp()));
    candidates.into_iter().next()
}

/// `@alias` for every user on the message's `Reviewers:` line. Project
/// reviewers (`#team`) are left out.
pub fn reviewer_mentions(message: &str, aliases: &HashMap<String, String>) -> Option<String> {
    let reviewers = message
        .lines()
        .find_map(|line| line.trim().strip_prefix(REVIEWERS_PREFIX))?;

    let mentions: Vec<String> = reviewers
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.starts_with('#'))
        .map(|name| format!("@{}", aliases.get(name).map(String::as_str).unwrap_or(name)))
        .collect();

    if mentions.is_empty() {
        None
    } else {
        Some(mentions.join(" "))
    }
}

#[async_trait]
impl Plugin for PhabDiffs {
    fn name(&self) -> &'static str {
        "phab_diffs"
    }

    fn accepts(&self, reference: &TrackerReference) -> bool {
        reference.kind == ReferenceKind::DiffId
    }

    async fn resolve(&self, references: &[TrackerReference]) -> Result<Option<String>> {
        let mut lines = Vec::new();
        for reference in references {
            if let Some(line) = self.lookup(reference).await? {
                lines.push(line);
            }
        }
        Ok(reply::emit(lines))
    }
}

use anyhow::Result;
use tracing::{debug, error, info};

use crate::matcher::{PatternTable, TrackerReference};
use crate::platform::IncomingMessage;
use crate::plugins::Plugin;
use crate::reply;

/// Routes each message through the pattern table and the plugins.
///
/// Holds no per-message state: every call is independent.
pub struct Responder {
    patterns: PatternTable,
    plugins: Vec<Box<dyn Plugin>>,
}

impl Responder {
    pub fn new(patterns: PatternTable, plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { patterns, plugins }
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Reply text for a message, or `None` when nothing should be posted.
    ///
    /// A failing plugin does not stop the others. The error is only
    /// returned when there is nothing else to say.
    pub async fn on_message(&self, message: &IncomingMessage) -> Result<Option<String>> {
        let text = message.text.as_str();
        let references = self.patterns.find(text);
        debug!("Found {} reference(s) in message", references.len());

        let mut replies = Vec::new();
        let mut first_error = None;

        for plugin in &self.plugins {
            let result = run_plugin(plugin.as_ref(), text, &references).await;

            match result {
                Ok(Some(reply)) => replies.push(reply),
                Ok(None) => {}
                Err(e) => {
                    error!("Plugin '{}' failed: {:#}", plugin.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match (reply::emit(replies), first_error) {
            (None, Some(e)) => Err(e),
            (reply, _) => Ok(reply),
        }
    }
}

async fn run_plugin(
    plugin: &dyn Plugin,
    text: &str,
    references: &[TrackerReference],
) -> Result<Option<String>> {
    let mut accepted: Vec<TrackerReference> = references
        .iter()
        .filter(|r| plugin.accepts(r))
        .cloned()
        .collect();
    accepted.extend(plugin.discover(text).await?);
    if accepted.is_empty() {
        return Ok(None);
    }

    info!(
        "Plugin '{}' resolving {} reference(s)",
        plugin.name(),
        accepted.len()
    );
    plugin.resolve(&accepted).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JiraConfig, PhabricatorConfig};
    use crate::fixtures::{self, FakeReview, FakeTracker};
    use crate::plugins::{jira_tickets::JiraTickets, leave::Leave, phab_diffs::PhabDiffs};
    use std::sync::Arc;

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            platform: "test".to_string(),
            user_id: "1".to_string(),
            chat_id: "2".to_string(),
            user_name: "tester".to_string(),
            text: text.to_string(),
        }
    }

    fn responder(tracker: FakeTracker) -> (Arc<FakeTracker>, Responder) {
        let tracker = Arc::new(tracker);
        let review = Arc::new(
            FakeReview::default()
                .with_diffs("1234", fixtures::diffs_from(fixtures::querydiffs_result())),
        );
        let phab = PhabricatorConfig {
            url: "https://phab.example.com".to_string(),
            ..PhabricatorConfig::default()
        };
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Leave),
            Box::new(JiraTickets::new(tracker.clone(), JiraConfig::default())),
            Box::new(PhabDiffs::new(review, phab)),
        ];
        (
            tracker,
            Responder::new(PatternTable::new("TD").unwrap(), plugins),
        )
    }

    #[tokio::test]
    async fn test_shorthand_ticket_reply_names_assignee() {
        let (tracker, responder) =
            responder(FakeTracker::default().with_issue(fixtures::td_11123()));

        let reply = responder
            .on_message(&message("!TD-11123"))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("Bertrand Cariou"));
        assert_eq!(tracker.fetched(), vec!["TD-11123"]);
    }

    #[tokio::test]
    async fn test_chatter_gets_no_reply() {
        let (tracker, responder) = responder(FakeTracker::default());
        for text in ["hello there", "", "what is the plan for today?"] {
            assert!(responder.on_message(&message(text)).await.unwrap().is_none());
        }
        assert!(tracker.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_replies_from_several_plugins_are_joined() {
        let (_, responder) = responder(FakeTracker::default().with_issue(fixtures::td_11123()));

        let reply = responder
            .on_message(&message("TD-11123 landed in D1234"))
            .await
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = reply.lines().collect();
        assert!(lines[0].starts_with("TD-11123: "));
        assert!(lines[1].starts_with("<https://phab.example.com/D1234|D1234>"));
    }

    #[tokio::test]
    async fn test_failure_alone_is_returned() {
        let (_, responder) = responder(FakeTracker::failing());
        assert!(responder.on_message(&message("TD-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_does_not_hide_other_replies() {
        let (_, responder) = responder(FakeTracker::failing());
        let reply = responder
            .on_message(&message("TD-1 and D1234"))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("D1234"));
        assert!(!reply.contains("TD-1:"));
    }

    #[tokio::test]
    async fn test_leave_command() {
        let (_, responder) = responder(FakeTracker::default());
        assert_eq!(
            responder.on_message(&message("rs leave")).await.unwrap().as_deref(),
            Some(crate::plugins::leave::LEAVE_REPLY)
        );
    }

    #[tokio::test]
    async fn test_leave_keeps_its_own_line_beside_other_replies() {
        let (_, responder) = responder(FakeTracker::default());
        let reply = responder
            .on_message(&message("D1234 merged, rs leave"))
            .await
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = reply.lines().collect();
        assert!(lines.contains(&crate::plugins::leave::LEAVE_REPLY));
        assert!(lines.iter().any(|l| l.contains("D1234|D1234")));
    }
}

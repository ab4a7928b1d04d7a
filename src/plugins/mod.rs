pub mod jira_query;
pub mod jira_tickets;
pub mod leave;
pub mod phab_diffs;
pub mod phab_macros;
pub mod scrum;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::jira::{IssueTracker, JiraClient};
use crate::matcher::TrackerReference;
use crate::phabricator::{PhabricatorClient, ReviewTool};

/// A message handler: claims some references, resolves them, shapes a reply.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this plugin handles the given reference.
    fn accepts(&self, reference: &TrackerReference) -> bool;

    /// References this plugin finds on its own, for triggers that are not
    /// known until the backend is asked.
    async fn discover(&self, _text: &str) -> Result<Vec<TrackerReference>> {
        Ok(Vec::new())
    }

    /// Resolve the accepted references into reply text, or `None` when
    /// nothing was found.
    async fn resolve(&self, references: &[TrackerReference]) -> Result<Option<String>>;
}

/// Every plugin, in reply order.
pub const ALL_PLUGINS: [&str; 6] = [
    "leave",
    "jira_tickets",
    "jira_query",
    "scrum",
    "phab_diffs",
    "phab_macros",
];

const NEEDS_JIRA: &str = "jira.user and jira.auth (JIRA_USER, JIRA_AUTH)";
const NEEDS_PHABRICATOR: &str =
    "phabricator.url and phabricator.api_token (PHAB_HOST, PHAB_API_TOKEN)";

/// Construct the enabled plugins with their backend clients.
///
/// With an explicit `plugins.enabled` list, a plugin whose backend is not
/// configured is a startup error. Otherwise such plugins are skipped.
pub fn build(config: &Config) -> Result<Vec<Box<dyn Plugin>>> {
    let strict = config.plugins.enabled.is_some();
    let names: Vec<String> = match &config.plugins.enabled {
        Some(names) => names.clone(),
        None => ALL_PLUGINS.iter().map(|n| n.to_string()).collect(),
    };

    let tracker: Option<Arc<dyn IssueTracker>> = config
        .jira
        .is_configured()
        .then(|| Arc::new(JiraClient::new(&config.jira)) as Arc<dyn IssueTracker>);
    let review: Option<Arc<dyn ReviewTool>> = config
        .phabricator
        .is_configured()
        .then(|| Arc::new(PhabricatorClient::new(&config.phabricator)) as Arc<dyn ReviewTool>);

    build_with(config, &names, strict, tracker, review)
}

pub(crate) fn build_with(
    config: &Config,
    names: &[String],
    strict: bool,
    tracker: Option<Arc<dyn IssueTracker>>,
    review: Option<Arc<dyn ReviewTool>>,
) -> Result<Vec<Box<dyn Plugin>>> {
    let mut plugins: Vec<Box<dyn Plugin>> = Vec::new();

    for name in names {
        let plugin: Result<Box<dyn Plugin>, &str> = match name.as_str() {
            "leave" => Ok(Box::new(leave::Leave) as Box<dyn Plugin>),
            "jira_tickets" => tracker
                .clone()
                .map(|t| {
                    Box::new(jira_tickets::JiraTickets::new(t, config.jira.clone()))
                        as Box<dyn Plugin>
                })
                .ok_or(NEEDS_JIRA),
            "jira_query" => tracker
                .clone()
                .map(|t| {
                    Box::new(jira_query::JiraQuery::new(t, config.jira.clone())) as Box<dyn Plugin>
                })
                .ok_or(NEEDS_JIRA),
            "scrum" => tracker
                .clone()
                .map(|t| Box::new(scrum::Scrum::new(t, config.jira.clone())) as Box<dyn Plugin>)
                .ok_or(NEEDS_JIRA),
            "phab_diffs" => review
                .clone()
                .map(|r| {
                    Box::new(phab_diffs::PhabDiffs::new(r, config.phabricator.clone()))
                        as Box<dyn Plugin>
                })
                .ok_or(NEEDS_PHABRICATOR),
            "phab_macros" => match &review {
                Some(_) if config.phabricator.file_url.is_empty() => {
                    Err("phabricator.file_url (PHAB_FILE_HOST)")
                }
                Some(r) => Ok(Box::new(phab_macros::PhabMacros::new(
                    r.clone(),
                    config.phabricator.clone(),
                )) as Box<dyn Plugin>),
                None => Err(NEEDS_PHABRICATOR),
            },
            other => anyhow::bail!("Unknown plugin: {}", other),
        };

        match plugin {
            Ok(plugin) => {
                info!("Loaded plugin: {}", plugin.name());
                plugins.push(plugin);
            }
            Err(missing) if strict => {
                anyhow::bail!("Plugin '{}' is enabled but {} is not set", name, missing)
            }
            Err(missing) => warn!("Skipping plugin '{}': {} is not set", name, missing),
        }
    }

    Ok(plugins)
}

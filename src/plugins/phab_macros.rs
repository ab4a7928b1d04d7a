use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::Plugin;
use crate::config::PhabricatorConfig;
use crate::matcher::{MacroMatcher, ReferenceKind, TrackerReference};
use crate::phabricator::ReviewTool;
use crate::reply;

/// Turns macro names mentioned in chat into file-proxy URLs that unfurl.
pub struct PhabMacros {
    review: Arc<dyn ReviewTool>,
    config: PhabricatorConfig,
    /// lowercased alias -> macro name
    aliases: HashMap<String, String>,
}

impl PhabMacros {
    pub fn new(review: Arc<dyn ReviewTool>, config: PhabricatorConfig) -> Self {
        let aliases = config
            .macro_aliases
            .iter()
            .map(|(alias, name)| (alias.to_lowercase(), name.clone()))
            .collect();
        Self {
            review,
            config,
            aliases,
        }
    }

    /// Macro name for a matched (lowercased) name, going through the alias table.
    pub fn proper_name(&self, found: &str) -> String {
        self.aliases
            .get(found)
            .cloned()
            .unwrap_or_else(|| found.to_string())
    }

    fn proxied(&self, uri: &str) -> String {
        rewrite_host(uri, self.config.base_url(), &self.config.file_url)
    }
}

/// Swap the `from` prefix of `uri` for `to`; other URIs pass through.
pub fn rewrite_host(uri: &str, from: &str, to: &str) -> String {
    match uri.strip_prefix(from) {
        Some(rest) if !from.is_empty() => format!("{}{}", to.trim_end_matches('/'), rest),
        _ => uri.to_string(),
    }
}

#[async_trait]
impl Plugin for PhabMacros {
    fn name(&self) -> &'static str {
        "phab_macros"
    }

    fn accepts(&self, reference: &TrackerReference) -> bool {
        reference.kind == ReferenceKind::MacroName
    }

    async fn discover(&self, text: &str) -> Result<Vec<TrackerReference>> {
        let directory = self.review.macros(None).await?;
        let names = directory.keys().chain(self.aliases.keys());
        Ok(MacroMatcher::new(names)?
            .map(|matcher| matcher.find(text))
            .unwrap_or_default())
    }

    async fn resolve(&self, references: &[TrackerReference]) -> Result<Option<String>> {
        let mut names: Vec<String> = Vec::new();
        for reference in references {
            let name = self.proper_name(&reference.value);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Ok(None);
        }

        debug!("Looking up macros: {:?}", names);
        let found = self.review.macros(Some(&names)).await?;

        let uris = names
            .iter()
            .filter_map(|name| found.get(name))
            .filter_map(|info| info.uri.as_deref())
            .map(|uri| self.proxied(uri));
        Ok(reply::emit(uris))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fixtures::FakeReview;

    fn config() -> PhabricatorConfig {
        let mut phab = Config::parse("[telegram]\n").unwrap().phabricator;
        phab.url = "https://phab.example.com".to_string();
        phab.api_token = "api-x".to_string();
        phab.file_url = "http://files.example.com".to_string();
        phab
    }

    fn review() -> FakeReview {
        FakeReview::default()
            .with_macro("nerdrage", "https://phab.example.com/file/data/abc/nerdrage.gif")
            .with_macro("dealbreaker", "https://phab.example.com/file/data/def/dealbreaker.gif")
            .with_macro("shipit", "https://cdn.elsewhere.com/shipit.png")
    }

    async fn run(plugin: &PhabMacros, text: &str) -> Option<String> {
        let refs = plugin.discover(text).await.unwrap();
        if refs.is_empty() {
            return None;
        }
        plugin.resolve(&refs).await.unwrap()
    }

    #[tokio::test]
    async fn test_macro_uri_rewritten_to_file_proxy() {
        let plugin = PhabMacros::new(Arc::new(review()), config());
        assert_eq!(
            run(&plugin, "NERDRAGE").await.as_deref(),
            Some("http://files.example.com/file/data/abc/nerdrage.gif")
        );
    }

    #[tokio::test]
    async fn test_alias_resolves_before_lookup() {
        let review = Arc::new(review());
        let plugin = PhabMacros::new(review.clone(), config());

        let reply = run(&plugin, "that is a Deal Breaker, #shutitdown").await;
        assert_eq!(
            reply.as_deref(),
            Some("http://files.example.com/file/data/def/dealbreaker.gif")
        );
        assert_eq!(review.named_macro_requests(), vec![vec!["dealbreaker".to_string()]]);
    }

    #[tokio::test]
    async fn test_foreign_uri_untouched() {
        let plugin = PhabMacros::new(Arc::new(review()), config());
        assert_eq!(
            run(&plugin, "shipit").await.as_deref(),
            Some("https://cdn.elsewhere.com/shipit.png")
        );
    }

    #[tokio::test]
    async fn test_no_macro_in_text() {
        let plugin = PhabMacros::new(Arc::new(review()), config());
        assert!(plugin.discover("nothing to see").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alias_without_directory_entry_gives_no_reply() {
        let plugin = PhabMacros::new(Arc::new(FakeReview::default()), config());
        assert_eq!(run(&plugin, "treat yo self").await, None);
    }

    #[test]
    fn test_rewrite_host() {
        assert_eq!(
            rewrite_host("https://phab.x/file/1", "https://phab.x", "http://files.x/"),
            "http://files.x/file/1"
        );
        assert_eq!(
            rewrite_host("https://other/1", "https://phab.x", "http://f"),
            "https://other/1"
        );
    }
}

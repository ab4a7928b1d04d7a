use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub phabricator: PhabricatorConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Chats the bot listens in. Empty means every chat it is added to.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    #[serde(default = "default_jira_server")]
    pub server: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub auth: String,
    /// Project code for the `!TD-12345` shorthand.
    #[serde(default = "default_shorthand_project")]
    pub shorthand_project: String,
    #[serde(default = "default_max_query_results")]
    pub max_query_results: u32,
    #[serde(default = "default_team_aliases")]
    pub team_aliases: HashMap<String, String>,
    /// Search resource under `/rest/api/2`. Cloud serves `search/jql`;
    /// Server and Data Center installs still use `search`.
    #[serde(default = "default_search_path")]
    pub search_path: String,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            server: default_jira_server(),
            user: String::new(),
            auth: String::new(),
            shorthand_project: default_shorthand_project(),
            max_query_results: default_max_query_results(),
            team_aliases: default_team_aliases(),
            search_path: default_search_path(),
        }
    }
}

impl JiraConfig {
    pub fn is_configured(&self) -> bool {
        !self.server.is_empty() && !self.user.is_empty() && !self.auth.is_empty()
    }

    /// Web URL for a ticket, e.g. `https://trifacta.atlassian.net/browse/TD-1`
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.server.trim_end_matches('/'), key)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhabricatorConfig {
    /// Base URL of the Phabricator install, e.g. `https://phab.example.com`
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_token: String,
    /// Base URL of the file proxy that macro URIs are rewritten to.
    #[serde(default)]
    pub file_url: String,
    #[serde(default = "default_macro_aliases")]
    pub macro_aliases: HashMap<String, String>,
    /// Phabricator username -> chat handle, used for reviewer mentions.
    #[serde(default)]
    pub user_aliases: HashMap<String, String>,
}

impl Default for PhabricatorConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_token: String::new(),
            file_url: String::new(),
            macro_aliases: default_macro_aliases(),
            user_aliases: HashMap::new(),
        }
    }
}

impl PhabricatorConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.api_token.is_empty()
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PluginsConfig {
    /// Plugins to load. When absent, every plugin whose backend is
    /// configured is loaded.
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
}

fn default_jira_server() -> String {
    "https://trifacta.atlassian.net".to_string()
}

fn default_search_path() -> String {
    "search/jql".to_string()
}

fn default_shorthand_project() -> String {
    "TD".to_string()
}

fn default_max_query_results() -> u32 {
    5
}

fn default_team_aliases() -> HashMap<String, String> {
    HashMap::from([("serenity".to_string(), "Bufs".to_string())])
}

fn default_macro_aliases() -> HashMap<String, String> {
    [
        ("nerd rage", "nerdrage"),
        ("because we're smart", "because-we-are-smart"),
        ("deal breaker", "dealbreaker"),
        ("#shutitdown", "dealbreaker"),
        ("#champion", "iwillbeyourchampion"),
        ("killing it", "killing-it"),
        ("what is happening", "spaceballs-tape"),
        ("treat yo self", "treatyoself"),
        ("treat yourself", "treatyoself"),
        ("you're a wizard", "youre-a-wizard"),
    ]
    .into_iter()
    .map(|(alias, name)| (alias.to_string(), name.to_string()))
    .collect()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Overlay environment variables on top of the file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(server) = lookup("JIRA_SERVER") {
            self.jira.server = server;
        }
        if let Some(user) = lookup("JIRA_USER") {
            self.jira.user = user;
        }
        if let Some(auth) = lookup("JIRA_AUTH") {
            self.jira.auth = auth;
        }
        if let Some(host) = lookup("PHAB_HOST") {
            self.phabricator.url = format!("https://{}", host);
        }
        if let Some(token) = lookup("PHAB_API_TOKEN") {
            self.phabricator.api_token = token;
        }
        if let Some(host) = lookup("PHAB_FILE_HOST") {
            self.phabricator.file_url = format!("http://{}", host);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!("telegram.bot_token is not set (or TELEGRAM_BOT_TOKEN)");
        }
        if self.jira.max_query_results == 0 {
            anyhow::bail!("jira.max_query_results must be at least 1");
        }
        Ok(())
    }
}

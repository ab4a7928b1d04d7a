use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::PhabricatorConfig;

/// Conduit encodes empty dictionaries as `[]`, so any object-valued field
/// may arrive as an empty list instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PhpObject<T> {
    Value(T),
    Empty(Vec<IgnoredAny>),
}

impl<T: Default> PhpObject<T> {
    pub fn into_inner(self) -> T {
        match self {
            PhpObject::Value(v) => v,
            PhpObject::Empty(_) => T::default(),
        }
    }
}

/// One diff (an uploaded revision of a differential revision).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Diff {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: Option<PhpObject<DiffProperties>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffProperties {
    #[serde(rename = "local:commits", default)]
    pub local_commits: Option<PhpObject<BTreeMap<String, LocalCommit>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalCommit {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub time: Option<serde_json::Value>,
}

impl LocalCommit {
    /// Commit time in seconds; Conduit sends it as either a string or a number.
    pub fn timestamp(&self) -> i64 {
        match &self.time {
            Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

impl Diff {
    fn numeric_id(&self) -> u64 {
        self.id.as_deref().and_then(|id| id.parse().ok()).unwrap_or(0)
    }

    /// Local commits recorded with this diff, newest first.
    pub fn commits(&self) -> Vec<LocalCommit> {
        let mut commits: Vec<LocalCommit> = self
            .properties
            .clone()
            .map(PhpObject::into_inner)
            .and_then(|props| props.local_commits)
            .map(PhpObject::into_inner)
            .unwrap_or_default()
            .into_values()
            .collect();
        commits.sort_by_key(|c| std::cmp::Reverse(c.timestamp()));
        commits
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MacroInfo {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConduitResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_info: Option<String>,
}

/// Read-only view of the code review tool used by the plugins.
#[async_trait]
pub trait ReviewTool: Send + Sync {
    /// All diffs of a revision (numeric id, no `D` prefix), newest first.
    async fn query_diffs(&self, revision_id: &str) -> Result<Vec<Diff>>;

    /// The macro directory, or only the named entries when `names` is given.
    async fn macros(&self, names: Option<&[String]>) -> Result<BTreeMap<String, MacroInfo>>;
}

pub struct PhabricatorClient {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
}

impl PhabricatorClient {
    pub fn new(config: &PhabricatorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: format!("{}/api", config.base_url()),
            api_token: config.api_token.clone(),
        }
    }

    async fn call<T>(&self, method: &str, params: Vec<(String, String)>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_url, method);
        debug!("Calling Conduit: {}", url);

        let mut form = vec![("api.token".to_string(), self.api_token.clone())];
        form.extend(params);

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to send Conduit request: {}", method))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Conduit API error ({}): {}", status, error_body);
        }

        let body: ConduitResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Conduit response: {}", method))?;

        if let Some(code) = body.error_code {
            anyhow::bail!(
                "Conduit error {}: {}",
                code,
                body.error_info.unwrap_or_default()
            );
        }

        Ok(body.result)
    }
}

#[async_trait]
impl ReviewTool for PhabricatorClient {
    async fn query_diffs(&self, revision_id: &str) -> Result<Vec<Diff>> {
        let result: Option<PhpObject<BTreeMap<String, Diff>>> = self
            .call(
                "differential.querydiffs",
                vec![("revisionIDs[0]".to_string(), revision_id.to_string())],
            )
            .await?;

        let mut diffs: Vec<Diff> = result
            .map(PhpObject::into_inner)
            .unwrap_or_default()
            .into_values()
            .collect();
        diffs.sort_by_key(|d| std::cmp::Reverse(d.numeric_id()));
        Ok(diffs)
    }

    async fn macros(&self, names: Option<&[String]>) -> Result<BTreeMap<String, MacroInfo>> {
        let params = names
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, name)| (format!("names[{}]", i), name.clone()))
            .collect();

        let result: Option<PhpObject<BTreeMap<String, MacroInfo>>> =
            self.call("macro.query", params).await?;
        Ok(result.map(PhpObject::into_inner).unwrap_or_default())
    }
}

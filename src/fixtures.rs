//! In-memory tracker and review-tool fakes plus recorded API payloads for tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::jira::{IssueTracker, JiraIssue};
use crate::phabricator::{Diff, MacroInfo, ReviewTool};

/// TD-11123 as the tracker returns it. No resolution, no bug cause.
pub fn td_11123() -> Value {
    json!({
        "key": "TD-11123",
        "fields": {
            "summary": "Join on dates drops rows across DST boundary",
            "description": "Steps:\r\n1. load the sample\r\n2. join on created\r\n3. observe missing rows\r\n4. cry",
            "assignee": { "displayName": "Bertrand Cariou" },
            "reporter": { "displayName": "Adam Silberstein" },
            "status": { "name": "In Progress" },
            "priority": { "name": "Major" },
            "issuetype": { "name": "Bug" },
            "resolution": null,
            "components": [{ "name": "Transformer" }, { "name": "Joins" }],
            "versions": [{ "name": "3.1" }],
            "fixVersions": [],
            "created": "2016-02-23T17:05:41.000-0800",
            "updated": "2016-03-01T09:12:00.000-0800",
            "customfield_11203": [{ "value": "Backend" }, { "id": "no-value" }],
            "customfield_11204": null
        }
    })
}

pub fn issue_json(key: &str, assignee: &str, status: &str) -> Value {
    json!({
        "key": key,
        "fields": {
            "summary": format!("Summary of {}", key),
            "assignee": { "displayName": assignee },
            "status": { "name": status },
            "issuetype": { "name": "Story" }
        }
    })
}

pub fn issue(key: &str, assignee: &str, status: &str) -> JiraIssue {
    serde_json::from_value(issue_json(key, assignee, status)).unwrap()
}

/// `differential.querydiffs` result for D1234: the newest diff carries one
/// commit with a test plan and one without; the oldest has no properties.
pub fn querydiffs_result() -> Value {
    json!({
        "9001": {
            "id": "9001",
            "properties": {
                "local:commits": {
                    "c0ffee": {
                        "message": "Older attempt\n\nTest Plan: none yet",
                        "author": "emarschner",
                        "summary": "Older attempt",
                        "time": "1456000000"
                    }
                }
            }
        },
        "9002": {
            "id": "9002",
            "properties": {
                "local:commits": {
                    "abc123": {
                        "message": "Fix the join\n\nSummary: dates\n\nTest Plan: ran the suite\n\nReviewers: jdoe, asmith",
                        "author": "bcariou",
                        "summary": "Fix the join",
                        "time": "1456100000"
                    },
                    "def456": {
                        "message": "wip",
                        "author": "bcariou",
                        "summary": "wip",
                        "time": "1456200000"
                    }
                }
            }
        },
        "8999": {
            "id": "8999",
            "properties": []
        }
    })
}

pub fn diffs_from(value: Value) -> Vec<Diff> {
    let map: BTreeMap<String, Diff> = serde_json::from_value(value).unwrap();
    let mut diffs: Vec<Diff> = map.into_values().collect();
    diffs.sort_by_key(|d| {
        std::cmp::Reverse(d.id.as_deref().and_then(|id| id.parse::<u64>().ok()))
    });
    diffs
}

#[derive(Default)]
pub struct FakeTracker {
    issues: HashMap<String, JiraIssue>,
    /// (jql substring, results) checked in order
    searches: Vec<(String, Vec<JiraIssue>)>,
    fail: bool,
    pub fetched: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<(String, u32)>>,
}

impl FakeTracker {
    pub fn with_issue(mut self, value: Value) -> Self {
        let issue: JiraIssue = serde_json::from_value(value).unwrap();
        self.issues.insert(issue.key.clone(), issue);
        self
    }

    pub fn with_search(mut self, jql_contains: &str, results: Vec<JiraIssue>) -> Self {
        self.searches.push((jql_contains.to_string(), results));
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, u32)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn issue(&self, key: &str) -> Result<Option<JiraIssue>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        self.fetched.lock().unwrap().push(key.to_string());
        Ok(self.issues.get(key).cloned())
    }

    async fn search(&self, jql: &str, max_results: u32) -> Result<Vec<JiraIssue>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        self.queries
            .lock()
            .unwrap()
            .push((jql.to_string(), max_results));
        let mut found = self
            .searches
            .iter()
            .find(|(needle, _)| jql.contains(needle.as_str()))
            .map(|(_, issues)| issues.clone())
            .unwrap_or_default();
        found.truncate(max_results as usize);
        Ok(found)
    }
}

#[derive(Default)]
pub struct FakeReview {
    diffs: HashMap<String, Vec<Diff>>,
    macros: BTreeMap<String, MacroInfo>,
    pub diff_requests: Mutex<Vec<String>>,
    pub macro_requests: Mutex<Vec<Option<Vec<String>>>>,
}

impl FakeReview {
    pub fn with_diffs(mut self, revision_id: &str, diffs: Vec<Diff>) -> Self {
        self.diffs.insert(revision_id.to_string(), diffs);
        self
    }

    pub fn with_macro(mut self, name: &str, uri: &str) -> Self {
        self.macros.insert(
            name.to_string(),
            MacroInfo {
                uri: Some(uri.to_string()),
            },
        );
        self
    }

    pub fn diff_requests(&self) -> Vec<String> {
        self.diff_requests.lock().unwrap().clone()
    }

    /// Names passed to each filtered macro lookup.
    pub fn named_macro_requests(&self) -> Vec<Vec<String>> {
        self.macro_requests
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReviewTool for FakeReview {
    async fn query_diffs(&self, revision_id: &str) -> Result<Vec<Diff>> {
        self.diff_requests
            .lock()
            .unwrap()
            .push(revision_id.to_string());
        Ok(self.diffs.get(revision_id).cloned().unwrap_or_default())
    }

    async fn macros(&self, names: Option<&[String]>) -> Result<BTreeMap<String, MacroInfo>> {
        self.macro_requests
            .lock()
            .unwrap()
            .push(names.map(|n| n.to_vec()));
        Ok(match names {
            None => self.macros.clone(),
            Some(names) => self
                .macros
                .iter()
                .filter(|(name, _)| names.contains(name))
                .map(|(name, info)| (name.clone(), info.clone()))
                .collect(),
        })
    }
}

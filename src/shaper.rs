use chrono::DateTime;

use crate::jira::{JiraIssue, Named};

/// Fields shown by the long style, in display order.
pub const DISPLAY_FIELDS: [&str; 8] = [
    "summary",
    "description",
    "status",
    "priority",
    "assignee",
    "reporter",
    "created_at",
    "updated",
];

/// Long-style fields keep at most this many lines of their value.
const MAX_FIELD_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// `<ticket>: <summary>, <status>, <assignee>, <url>`
    Short,
    /// One line per display field plus the URL.
    Long,
}

/// Flat view of an issue. Anything the tracker left out stays `None` and
/// renders as an empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueRecord {
    pub key: String,
    pub url: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub resolution: Option<String>,
    pub components: Option<String>,
    pub affected_versions: Option<String>,
    pub fix_versions: Option<String>,
    pub created_at: Option<String>,
    pub updated: Option<String>,
    pub architecture_component: Vec<String>,
    pub bug_cause: Option<String>,
}

impl IssueRecord {
    pub fn from_issue(issue: &JiraIssue, url: String) -> Self {
        let fields = &issue.fields;
        Self {
            key: issue.key.clone(),
            url,
            summary: fields.summary.clone(),
            description: fields.description.clone(),
            assignee: fields.assignee.as_ref().and_then(|u| u.display_name.clone()),
            reporter: fields.reporter.as_ref().and_then(|u| u.display_name.clone()),
            status: name_of(&fields.status),
            priority: name_of(&fields.priority),
            issue_type: name_of(&fields.issue_type),
            resolution: name_of(&fields.resolution),
            components: join_names(&fields.components),
            affected_versions: join_names(&fields.affected_versions),
            fix_versions: join_names(&fields.fix_versions),
            created_at: fields.created.as_deref().map(format_date),
            updated: fields.updated.as_deref().map(format_date),
            architecture_component: fields
                .architecture_component
                .iter()
                .flatten()
                .filter_map(|opt| opt.value.clone())
                .collect(),
            bug_cause: fields.bug_cause.as_ref().and_then(|opt| opt.value.clone()),
        }
    }

    /// Field value by display name, empty when missing or unknown.
    pub fn field(&self, name: &str) -> String {
        let value = match name {
            "id" | "ticket" => Some(self.key.as_str()),
            "url" => Some(self.url.as_str()),
            "summary" => self.summary.as_deref(),
            "description" => self.description.as_deref(),
            "assignee" => self.assignee.as_deref(),
            "reporter" => self.reporter.as_deref(),
            "status" => self.status.as_deref(),
            "priority" => self.priority.as_deref(),
            "issue_type" => self.issue_type.as_deref(),
            "resolution" => self.resolution.as_deref(),
            "components" => self.components.as_deref(),
            "affected_versions" => self.affected_versions.as_deref(),
            "fix_versions" => self.fix_versions.as_deref(),
            "created_at" => self.created_at.as_deref(),
            "updated" => self.updated.as_deref(),
            "architecture_component" => return self.architecture_component.join(", "),
            "bug_cause" => self.bug_cause.as_deref(),
            _ => None,
        };
        value.unwrap_or_default().to_string()
    }
}

fn name_of(named: &Option<Named>) -> Option<String> {
    named.as_ref().and_then(|n| n.name.clone())
}

fn join_names(list: &Option<Vec<Named>>) -> Option<String> {
    list.as_ref().map(|items| {
        items
            .iter()
            .filter_map(|item| item.name.as_deref())
            .collect::<Vec<_>>()
            .join(",")
    })
}

/// Reduce a tracker timestamp such as `2016-02-23T17:05:41.000-0800` to
/// `2016-02-23`. Unparseable values are returned untouched.
pub fn format_date(raw: &str) -> String {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Join the first few lines of a value into one line.
fn first_lines(value: &str, max_lines: usize) -> String {
    value
        .lines()
        .take(max_lines)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shape(record: &IssueRecord, style: Style) -> String {
    match style {
        Style::Short => format!(
            "{}: {}, {}, {}, {}",
            record.key,
            record.field("summary"),
            record.field("status"),
            record.field("assignee"),
            record.url
        ),
        Style::Long => {
            let mut lines = Vec::with_capacity(DISPLAY_FIELDS.len() + 2);
            lines.push(record.key.clone());
            for name in DISPLAY_FIELDS {
                let line = format!("{}: {}", name, record.field(name));
                lines.push(first_lines(&line, MAX_FIELD_LINES));
            }
            lines.push(format!("url: {}", record.url));
            lines.join("\n")
        }
    }
}

/// `<assignee>: <ticket> (<issue type>) - <summary>` followed by the URL.
pub fn scrum_line(record: &IssueRecord) -> String {
    format!(
        "{}: {} ({}) - {}\n{}",
        record.field("assignee"),
        record.key,
        record.field("issue_type"),
        record.field("summary"),
        record.url
    )
}

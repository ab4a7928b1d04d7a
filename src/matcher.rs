use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// What a piece of message text refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Ticket,
    Query,
    DiffId,
    MacroName,
    LeaveCommand,
}

/// A single trigger found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerReference {
    pub kind: ReferenceKind,
    pub value: String,
    /// The command word in front of the trigger, if any (`rs`, `ping`, `jira`, ...)
    pub context: Option<String>,
}

impl TrackerReference {
    pub fn new(kind: ReferenceKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn context_is(&self, word: &str) -> bool {
        self.context.as_deref().map(str::trim) == Some(word)
    }
}

/// One row of the pattern table. Patterns expose the trigger as the `value`
/// group and the optional preceding command word (`rs`, `ping`, `qd`) as `ctx`.
struct PatternRule {
    kind: ReferenceKind,
    regex: Regex,
}

/// Every fixed trigger pattern, applied once per message.
pub struct PatternTable {
    rules: Vec<PatternRule>,
}

impl PatternTable {
    /// Build the standard table. `shorthand_project` is the project code
    /// accepted by the `!TD-12345` shorthand.
    pub fn new(shorthand_project: &str) -> Result<Self> {
        let shorthand = format!(
            r"!(?P<value>{}-[0-9]{{5}})\b",
            regex::escape(shorthand_project)
        );
        let rules = [
            (ReferenceKind::LeaveCommand, r"\b(?P<ctx>rs|rosencrantz) (?P<value>leave)\b"),
            (ReferenceKind::Ticket, shorthand.as_str()),
            (ReferenceKind::Ticket, r"(?:\b(?P<ctx>rs)\s+)?\b(?P<value>[A-Z]+-\d+)\b"),
            (ReferenceKind::Query, r"\brs (?P<ctx>jira|scrum) (?P<value>.+)"),
            (ReferenceKind::DiffId, r"(?:\b(?P<ctx>ping|qd)\s+)?\b(?P<value>D\d+)\b"),
        ]
        .into_iter()
        .map(|(kind, pattern)| {
            Regex::new(pattern)
                .with_context(|| format!("Invalid {:?} pattern: {}", kind, pattern))
                .map(|regex| PatternRule { kind, regex })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// All references in `text`, in order of appearance, without duplicates.
    pub fn find(&self, text: &str) -> Vec<TrackerReference> {
        let mut found: Vec<(usize, TrackerReference)> = Vec::new();

        for rule in &self.rules {
            for caps in rule.regex.captures_iter(text) {
                let Some(value) = caps.name("value") else {
                    continue;
                };
                let trimmed = value.as_str().trim();
                if trimmed.is_empty() {
                    continue;
                }
                let mut reference = TrackerReference::new(rule.kind, trimmed);
                if let Some(ctx) = caps.name("ctx") {
                    reference = reference.with_context(ctx.as_str());
                }
                found.push((value.start(), reference));
            }
        }

        found.sort_by_key(|(start, _)| *start);
        dedup(found.into_iter().map(|(_, r)| r))
    }
}

fn dedup(references: impl Iterator<Item = TrackerReference>) -> Vec<TrackerReference> {
    let mut unique: Vec<TrackerReference> = Vec::new();
    for reference in references {
        if !unique
            .iter()
            .any(|r| r.kind == reference.kind && r.value == reference.value)
        {
            unique.push(reference);
        }
    }
    unique
}

/// Case-insensitive matcher over a set of macro names known at call time.
pub struct MacroMatcher {
    regex: Regex,
}

impl MacroMatcher {
    /// Returns `None` when there are no names to look for.
    pub fn new<I, S>(names: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        // longest first so that "treat yourself" wins over a shorter macro
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let alternatives: Vec<String> = names.iter().map(|n| bounded(n)).collect();
        let pattern = format!("(?P<value>{})", alternatives.join("|"));

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(64 * (1 << 20))
            .build()
            .context("Failed to build macro name pattern")?;

        Ok(Some(Self { regex }))
    }

    pub fn find(&self, text: &str) -> Vec<TrackerReference> {
        dedup(self.regex.captures_iter(text).filter_map(|caps| {
            caps.name("value").map(|m| {
                TrackerReference::new(ReferenceKind::MacroName, m.as_str().to_lowercase())
            })
        }))
    }
}

/// Wrap a name in the boundary assertions that fit its first and last
/// characters: `\b` next to word characters, `\B` next to punctuation.
fn bounded(name: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let edge = |word: bool| if word { r"\b" } else { r"\B" };
    format!(
        "{}{}{}",
        edge(is_word(name.chars().next())),
        regex::escape(name),
        edge(is_word(name.chars().last()))
    )
}

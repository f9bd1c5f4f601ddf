//! Validation issues.
//!
//! This module provides [`Issue`] for a single validation failure and
//! [`Issues`] for the non-empty list a failed parse returns.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use stillwater::prelude::*;

use super::messages::ErrorMap;
use crate::path::{JsonPath, PathSegment};
use crate::value::{Value, ValueType};

/// What kind of value a size, key or element issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    String,
    Array,
    Set,
    Map,
    Record,
    File,
    Number,
    BigInt,
    Date,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::String => "string",
            Origin::Array => "array",
            Origin::Set => "set",
            Origin::Map => "map",
            Origin::Record => "record",
            Origin::File => "file",
            Origin::Number => "number",
            Origin::BigInt => "bigint",
            Origin::Date => "date",
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bound in a `too_small` / `too_big` issue.
#[derive(Debug, Clone, PartialEq)]
pub enum Limit {
    Number(f64),
    BigInt(i128),
    Date(DateTime<Utc>),
    Size(usize),
}

impl Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Number(n) => write!(f, "{}", Value::Number(*n)),
            Limit::BigInt(n) => write!(f, "{}", n),
            Limit::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Limit::Size(n) => write!(f, "{}", n),
        }
    }
}

/// The code of an issue together with its code-specific metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// The value is not of the expected primitive kind.
    InvalidType {
        expected: String,
        received: ValueType,
    },
    /// The value is not one of the allowed literal values.
    InvalidValue { values: Vec<Value> },
    /// Right kind, wrong shape (email, uuid, regex, template literal, ...).
    InvalidFormat {
        format: String,
        pattern: Option<String>,
    },
    TooSmall {
        origin: Origin,
        minimum: Limit,
        inclusive: bool,
        exact: bool,
    },
    TooBig {
        origin: Origin,
        maximum: Limit,
        inclusive: bool,
        exact: bool,
    },
    NotMultipleOf { divisor: f64 },
    UnrecognizedKeys { keys: Vec<String> },
    /// A record or map key failed its key schema.
    InvalidKey { origin: Origin, issues: Vec<Issue> },
    /// A map value under a non-property key failed its value schema.
    InvalidElement {
        origin: Origin,
        key: Value,
        issues: Vec<Issue>,
    },
    /// No union option accepted the value. `errors` holds each option's issues
    /// in declaration order.
    InvalidUnion {
        errors: Vec<Vec<Issue>>,
        note: Option<String>,
        discriminator: Option<String>,
    },
    /// A user refinement failed.
    Custom { params: Option<serde_json::Value> },
}

impl IssueKind {
    /// Machine-readable code (e.g. `invalid_type`).
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::InvalidType { .. } => "invalid_type",
            IssueKind::InvalidValue { .. } => "invalid_value",
            IssueKind::InvalidFormat { .. } => "invalid_format",
            IssueKind::TooSmall { .. } => "too_small",
            IssueKind::TooBig { .. } => "too_big",
            IssueKind::NotMultipleOf { .. } => "not_multiple_of",
            IssueKind::UnrecognizedKeys { .. } => "unrecognized_keys",
            IssueKind::InvalidKey { .. } => "invalid_key",
            IssueKind::InvalidElement { .. } => "invalid_element",
            IssueKind::InvalidUnion { .. } => "invalid_union",
            IssueKind::Custom { .. } => "custom",
        }
    }

    pub(crate) fn nested_mut(&mut self) -> Vec<&mut Vec<Issue>> {
        match self {
            IssueKind::InvalidKey { issues, .. } | IssueKind::InvalidElement { issues, .. } => {
                vec![issues]
            }
            IssueKind::InvalidUnion { errors, .. } => errors.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// A single validation failure.
///
/// `fatal` marks an issue that aborts the owning sub-parse: type mismatches and
/// structural failures are fatal, refinement failures are not (the value has
/// the right shape, so siblings and later checks still run).
///
/// # Example
///
/// ```rust
/// use sieve::{Issue, JsonPath};
///
/// let issue = Issue::custom("passwords do not match").with_path(JsonPath::from_field("confirm"));
///
/// assert_eq!(issue.code(), "custom");
/// assert!(!issue.fatal);
/// assert_eq!(issue.path.to_string(), "confirm");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub kind: IssueKind,
    /// Location relative to the node that produced it; absolute once returned.
    pub path: JsonPath,
    /// The offending input. Dropped at the end of a parse unless
    /// `report_input` is set.
    pub input: Option<Value>,
    /// Resolved message. `None` until the driver finalizes the issue, unless
    /// set explicitly.
    pub message: Option<String>,
    pub fatal: bool,
    pub(crate) error_map: Option<ErrorMap>,
}

impl Issue {
    /// Creates a fatal issue at the root path.
    pub fn new(kind: IssueKind) -> Self {
        Self {
            kind,
            path: JsonPath::root(),
            input: None,
            message: None,
            fatal: true,
            error_map: None,
        }
    }

    /// Creates a non-fatal `custom` issue with a fixed message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(IssueKind::Custom { params: None })
            .with_message(message)
            .fatal(false)
    }

    pub(crate) fn invalid_type(expected: impl Into<String>, input: &Value) -> Self {
        Self::new(IssueKind::InvalidType {
            expected: expected.into(),
            received: input.value_type(),
        })
        .with_input(input.clone())
    }

    pub fn with_path(mut self, path: JsonPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets whether this issue aborts the owning sub-parse.
    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    pub(crate) fn with_error_map(mut self, map: Option<&ErrorMap>) -> Self {
        if self.error_map.is_none() {
            self.error_map = map.cloned();
        }
        self
    }

    /// Returns this issue with `segment` in front of its path.
    pub fn prefixed(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path = self.path.prepend(segment);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// The resolved message, or the generic fallback before finalization.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("Invalid input")
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path_str = if self.path.is_root() {
            "(root)".to_string()
        } else {
            self.path.to_string()
        };
        write!(f, "{}: {} [{}]", path_str, self.message(), self.code())
    }
}

/// A non-empty list of issues.
///
/// Returned by failed parses. `Issues` implements `Semigroup`, so the results
/// of independent parses can be combined:
///
/// ```rust
/// use sieve::{Issue, Issues, JsonPath};
/// use stillwater::prelude::*;
///
/// let a = Issues::single(Issue::custom("a").with_path(JsonPath::from_field("name")));
/// let b = Issues::single(Issue::custom("b").with_path(JsonPath::from_field("email")));
///
/// assert_eq!(a.combine(b).len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Issues(NonEmptyVec<Issue>);

impl Issues {
    pub fn single(issue: Issue) -> Self {
        Self(NonEmptyVec::singleton(issue))
    }

    /// Returns `None` for an empty list.
    pub fn from_vec(issues: Vec<Issue>) -> Option<Self> {
        NonEmptyVec::from_vec(issues).map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the list is guaranteed non-empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.0.iter()
    }

    /// Returns all issues at exactly `path`.
    pub fn at_path(&self, path: &JsonPath) -> Vec<&Issue> {
        self.0.iter().filter(|i| &i.path == path).collect()
    }

    /// Returns all issues with the given code.
    pub fn with_code(&self, code: &str) -> Vec<&Issue> {
        self.0.iter().filter(|i| i.code() == code).collect()
    }

    pub fn first(&self) -> &Issue {
        self.0.head()
    }

    pub fn into_vec(self) -> Vec<Issue> {
        self.0.into_vec()
    }
}

impl Semigroup for Issues {
    fn combine(self, other: Self) -> Self {
        Issues(self.0.combine(other.0))
    }
}

impl Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} issue(s):", self.len())?;
        for (i, issue) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for Issues {}

impl IntoIterator for Issues {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<Issues>();
    assert_sync::<Issues>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_defaults() {
        let issue = Issue::new(IssueKind::UnrecognizedKeys {
            keys: vec!["x".to_string()],
        });
        assert!(issue.fatal);
        assert!(issue.path.is_root());
        assert_eq!(issue.code(), "unrecognized_keys");
        assert_eq!(issue.message(), "Invalid input");
    }

    #[test]
    fn test_invalid_type_records_received_kind() {
        let issue = Issue::invalid_type("string", &Value::Number(4.0));
        match &issue.kind {
            IssueKind::InvalidType { expected, received } => {
                assert_eq!(expected, "string");
                assert_eq!(*received, ValueType::Number);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(issue.input, Some(Value::Number(4.0)));
    }

    #[test]
    fn test_prefixing_builds_path_outward() {
        let issue = Issue::custom("bad").prefixed("email").prefixed(2usize).prefixed("users");
        assert_eq!(issue.path.to_string(), "users[2].email");
    }

    #[test]
    fn test_display_includes_path_and_code() {
        let issue = Issue::custom("must match").with_path(JsonPath::from_field("confirm"));
        assert_eq!(issue.to_string(), "confirm: must match [custom]");

        let root = Issue::custom("nope");
        assert!(root.to_string().starts_with("(root)"));
    }

    #[test]
    fn test_issues_queries() {
        let issues = Issues::from_vec(vec![
            Issue::custom("a").with_path(JsonPath::from_field("a")),
            Issue::invalid_type("number", &Value::Null).with_path(JsonPath::from_field("a")),
            Issue::custom("b").with_path(JsonPath::from_field("b")),
        ])
        .unwrap();

        assert_eq!(issues.len(), 3);
        assert_eq!(issues.at_path(&JsonPath::from_field("a")).len(), 2);
        assert_eq!(issues.with_code("custom").len(), 2);
        assert_eq!(issues.first().message(), "a");
        assert!(Issues::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn test_issues_display() {
        let issues = Issues::single(Issue::custom("required").with_path(JsonPath::from_field("name")));
        let display = issues.to_string();
        assert!(display.contains("1 issue(s)"));
        assert!(display.contains("name: required"));
    }
}

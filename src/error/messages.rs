//! Message resolution.
//!
//! The engine never formats messages while parsing. Issues carry codes and
//! metadata; the driver resolves a message for each one at the end through a
//! chain of [`ErrorMap`]s, falling back to [`default_message`].

use std::fmt;
use std::sync::Arc;

use super::issue::{Issue, IssueKind, Limit, Origin};

type MapFn = dyn Fn(&Issue, &str) -> Option<String> + Send + Sync;

/// Maps an issue and its default message to a final message.
///
/// Returning `None` defers to the next map in the chain.
///
/// # Example
///
/// ```rust
/// use sieve::{ErrorMap, Schema};
///
/// let map = ErrorMap::new(|issue, default| match issue.code() {
///     "invalid_type" => Some(format!("type error: {}", default)),
///     _ => None,
/// });
///
/// let err = Schema::string().parse_with(5, &sieve::ParseOptions::new().error(map)).unwrap_err();
/// assert!(err.to_string().contains("type error: "));
/// ```
#[derive(Clone)]
pub struct ErrorMap(Arc<MapFn>);

impl ErrorMap {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Issue, &str) -> Option<String> + Send + Sync + 'static,
    {
        ErrorMap(Arc::new(f))
    }

    /// A map that always yields `message`.
    pub fn message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_, _| Some(message.clone()))
    }

    pub(crate) fn resolve(&self, issue: &Issue, default: &str) -> Option<String> {
        (self.0)(issue, default)
    }
}

impl PartialEq for ErrorMap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorMap(..)")
    }
}

fn unit(origin: Origin) -> Option<&'static str> {
    match origin {
        Origin::String => Some("characters"),
        Origin::File => Some("bytes"),
        Origin::Array | Origin::Set | Origin::Map | Origin::Record => Some("items"),
        _ => None,
    }
}

fn bound_message(
    direction: &str,
    origin: Origin,
    limit: &Limit,
    inclusive: bool,
    exact: bool,
    upper: bool,
) -> String {
    let adj = match (exact, inclusive, upper) {
        (true, _, _) => "",
        (false, true, true) => "<=",
        (false, false, true) => "<",
        (false, true, false) => ">=",
        (false, false, false) => ">",
    };
    match unit(origin) {
        Some(unit) => format!(
            "{}: expected {} to have {}{} {}",
            direction, origin, adj, limit, unit
        ),
        None => format!("{}: expected {} to be {}{}", direction, origin, adj, limit),
    }
}

/// The built-in English message for an issue.
pub fn default_message(issue: &Issue) -> String {
    match &issue.kind {
        IssueKind::InvalidType { expected, received } => {
            format!("Invalid input: expected {}, received {}", expected, received)
        }
        IssueKind::InvalidValue { values } => match values.as_slice() {
            [single] => format!("Invalid input: expected {}", single),
            many => format!(
                "Invalid option: expected one of {}",
                many.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("|")
            ),
        },
        IssueKind::InvalidFormat { format, pattern } => match (format.as_str(), pattern) {
            ("starts_with", Some(p)) => format!("Invalid string: must start with \"{}\"", p),
            ("ends_with", Some(p)) => format!("Invalid string: must end with \"{}\"", p),
            ("includes", Some(p)) => format!("Invalid string: must include \"{}\"", p),
            ("regex", Some(p)) => format!("Invalid string: must match pattern /{}/", p),
            (other, _) => format!("Invalid {}", other),
        },
        IssueKind::TooSmall {
            origin,
            minimum,
            inclusive,
            exact,
        } => bound_message("Too small", *origin, minimum, *inclusive, *exact, false),
        IssueKind::TooBig {
            origin,
            maximum,
            inclusive,
            exact,
        } => bound_message("Too big", *origin, maximum, *inclusive, *exact, true),
        IssueKind::NotMultipleOf { divisor } => {
            format!("Invalid number: must be a multiple of {}", divisor)
        }
        IssueKind::UnrecognizedKeys { keys } => {
            let plural = if keys.len() > 1 { "s" } else { "" };
            let listed = keys
                .iter()
                .map(|k| format!("\"{}\"", k))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Unrecognized key{}: {}", plural, listed)
        }
        IssueKind::InvalidKey { origin, .. } => format!("Invalid key in {}", origin),
        IssueKind::InvalidElement { origin, .. } => format!("Invalid value in {}", origin),
        IssueKind::InvalidUnion { .. } | IssueKind::Custom { .. } => "Invalid input".to_string(),
    }
}

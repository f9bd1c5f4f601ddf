use thiserror::Error;

use super::issue::Issues;
use crate::path::JsonPath;

/// A programmer or usage error raised while running a schema.
///
/// These are not validation failures: they abort the whole parse and are never
/// turned into issues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// An asynchronous check, transform or promise was reached by a
    /// synchronous parse.
    #[error("encountered asynchronous work during a synchronous parse; use parse_async or safe_parse_async")]
    AsyncInSync,

    /// Both sides of an intersection succeeded but their outputs cannot be
    /// merged.
    #[error("unmergeable intersection results at path '{path}'")]
    UnmergeableIntersection { path: JsonPath },

    /// A discriminated union's lookup table could not be built.
    #[error(transparent)]
    Build(#[from] SchemaBuildError),

    /// Lazy nesting went deeper than the configured limit.
    #[error("maximum lazy schema depth {max_depth} exceeded")]
    DepthExceeded { max_depth: usize },

    /// A recursive back reference was used after its root schema was dropped.
    #[error("recursive schema reference outlived its root schema")]
    UnresolvedLazy,
}

/// A schema could not be constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaBuildError {
    #[error("duplicate discriminator value {value} for key '{discriminator}'")]
    DuplicateDiscriminator { discriminator: String, value: String },

    #[error("option {index} has no literal values for discriminator key '{discriminator}'")]
    MissingDiscriminator { discriminator: String, index: usize },

    #[error("invalid regular expression: {0}")]
    InvalidPattern(String),

    #[error("template literal part {index} has no string pattern")]
    UnpatternedTemplatePart { index: usize },
}

impl From<regex::Error> for SchemaBuildError {
    fn from(err: regex::Error) -> Self {
        SchemaBuildError::InvalidPattern(err.to_string())
    }
}

/// The error returned by [`Schema::parse`](crate::Schema::parse) and
/// [`Schema::parse_async`](crate::Schema::parse_async).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The input failed validation. The message lists every issue.
    #[error("{0}")]
    Invalid(Issues),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ParseError {
    /// Returns the issues if this is a validation failure.
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            ParseError::Invalid(issues) => Some(issues),
            ParseError::Engine(_) => None,
        }
    }
}

impl From<Issues> for ParseError {
    fn from(issues: Issues) -> Self {
        ParseError::Invalid(issues)
    }
}

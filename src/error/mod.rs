//! Issue and error types.
//!
//! Validation failures are data: [`Issue`]s accumulate in the parse payload and
//! reach the caller as a non-empty [`Issues`] list. Programmer errors (async
//! work in a synchronous parse, unmergeable intersections, broken schema
//! construction) are ordinary Rust errors: [`EngineError`] and
//! [`SchemaBuildError`].

mod engine_error;
mod issue;
mod messages;

pub use engine_error::{EngineError, ParseError, SchemaBuildError};
pub use issue::{Issue, IssueKind, Issues, Limit, Origin};
pub use messages::{default_message, ErrorMap};

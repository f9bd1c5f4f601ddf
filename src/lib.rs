//! # Sieve
//!
//! A schema engine that parses untrusted, dynamically typed input into either
//! a normalized value or a complete, itemized list of issues.
//!
//! ## Overview
//!
//! Schemas are composed declaratively from leaves (strings, numbers,
//! literals, ...), composites (objects, arrays, unions, intersections, ...)
//! and wrappers (optional, default, catch, transform, pipe, lazy, ...). A
//! parse never stops at the first problem: every failing field is reported
//! with its path, and failures are accumulated as data through stillwater's
//! `Validation` type rather than thrown.
//!
//! Parsing is synchronous by default. Schemas that carry asynchronous
//! refinements, transforms or promises must be run through the `*_async`
//! entry points; a synchronous parse that reaches one fails with
//! [`EngineError::AsyncInSync`] before invoking it.
//!
//! ## Core Types
//!
//! - [`Schema`]: an immutable, shareable schema node
//! - [`Value`]: the dynamic input and output domain
//! - [`Check`]: a post-parse refinement attached to any schema
//! - [`Issue`] / [`Issues`]: a single validation failure / a non-empty list
//! - [`JsonPath`]: where in the input an issue occurred (e.g. `users[0].email`)
//! - [`EngineError`]: programmer errors that abort the whole parse
//!
//! ## Example
//!
//! ```rust
//! use sieve::{Check, Schema, StringFormat};
//! use serde_json::json;
//!
//! let user = Schema::object()
//!     .field("email", Schema::string().check(Check::format(StringFormat::Email)))
//!     .field("age", Schema::number().check(Check::int()).check(Check::gte(0)))
//!     .optional("nickname", Schema::string())
//!     .build();
//!
//! let result = user.safe_parse(json!({"email": "ada@example.com", "age": 36})).unwrap();
//! assert!(result.is_success());
//!
//! let issues = user
//!     .safe_parse(json!({"email": "nope", "age": -1}))
//!     .unwrap()
//!     .into_result()
//!     .unwrap_err();
//! assert_eq!(issues.len(), 2);
//! assert_eq!(issues.first().path.to_string(), "email");
//! ```

pub mod check;
pub mod config;
mod context;
pub mod error;
mod parse;
pub mod path;
mod payload;
pub mod schema;
pub mod value;

pub use check::{Check, Refinement, RefinementCtx, StringFormat};
pub use config::{GlobalConfig, ParseOptions};
pub use error::{
    default_message, EngineError, ErrorMap, Issue, IssueKind, Issues, Limit, Origin, ParseError,
    SchemaBuildError,
};
pub use parse::SafeParseResult;
pub use path::{JsonPath, PathSegment};
pub use payload::{ParsePayload, Status};
pub use schema::{
    CatchContext, DiscriminatedUnionBuilder, ObjectSchema, Schema, SchemaTag, TemplatePart,
};
pub use value::{DeferredValue, FileValue, Object, Symbol, Value, ValueType};

//! Object schema validation.
//!
//! This module provides [`ObjectSchema`], a builder for object nodes with an
//! ordered shape, plus the parser that runs them. Every key is processed even
//! after a failure, so one pass reports every problem.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::context::ParseContext;
use crate::error::{Issue, IssueKind};
use crate::path::PathSegment;
use crate::payload::{self, ParsePayload, RunResult, Step};
use crate::value::{Object, Value};

use super::{Schema, SchemaDef};

/// How keys outside the shape are handled.
#[derive(Clone)]
pub(crate) enum UnknownKeys {
    /// Drop them from the output.
    Strip,
    /// Reject them with one `unrecognized_keys` issue.
    Strict,
    /// Copy them to the output unchanged.
    Passthrough,
    /// Validate each against a schema.
    Catchall(Schema),
}

#[derive(Clone)]
pub(crate) struct ObjectDef {
    shape: IndexMap<String, Schema>,
    unknown_keys: UnknownKeys,
    plan: Arc<OnceLock<Arc<[bool]>>>,
}

impl ObjectDef {
    /// Per-key optionality, in shape order. A key is optional when its schema
    /// both accepts and may emit `undefined`.
    fn optional_keys(&self) -> Arc<[bool]> {
        self.shape
            .values()
            .map(|schema| schema.optin() && schema.optout())
            .collect()
    }

    /// The cached plan, or a fresh one when `jitless` is set. Both produce
    /// identical results.
    fn plan(&self, ctx: &ParseContext) -> Arc<[bool]> {
        if ctx.jitless() {
            return self.optional_keys();
        }
        self.plan
            .get_or_init(|| {
                tracing::trace!(keys = self.shape.len(), "building object plan");
                self.optional_keys()
            })
            .clone()
    }

    pub(super) fn prop_values(&self) -> IndexMap<String, Vec<Value>> {
        self.shape
            .iter()
            .filter_map(|(key, schema)| schema.values().map(|values| (key.clone(), values)))
            .collect()
    }
}

/// A builder for object schemas.
///
/// Fields are validated in declaration order and all failures are
/// accumulated. Call [`build`](Self::build) (or use `Into<Schema>`) to get a
/// [`Schema`].
///
/// # Example
///
/// ```rust
/// use sieve::{Check, Schema};
/// use serde_json::json;
///
/// let schema = Schema::object()
///     .field("name", Schema::string().check(Check::min_length(1)))
///     .optional("email", Schema::string())
///     .default("role", Schema::string(), "user")
///     .strict()
///     .build();
///
/// let output = schema.parse(json!({"name": "Alice"})).unwrap();
/// assert_eq!(output.get("role"), Some(&"user".into()));
/// assert!(output.get("email").is_none());
///
/// assert!(schema.parse(json!({"name": "Alice", "admin": true})).is_err());
/// ```
#[derive(Clone)]
pub struct ObjectSchema {
    shape: IndexMap<String, Schema>,
    unknown_keys: UnknownKeys,
}

impl ObjectSchema {
    /// Creates an object schema with no fields.
    pub fn new() -> Self {
        Self {
            shape: IndexMap::new(),
            unknown_keys: UnknownKeys::Strip,
        }
    }

    /// Adds a field. Whether it may be missing is decided by `schema` (see
    /// [`Schema::optin`]).
    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.shape.insert(name.into(), schema.into());
        self
    }

    /// Adds a field that may be missing.
    pub fn optional(self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.field(name, schema.into().optional())
    }

    /// Adds a field that takes `default` when missing.
    pub fn default(
        self,
        name: impl Into<String>,
        schema: impl Into<Schema>,
        default: impl Into<Value>,
    ) -> Self {
        self.field(name, schema.into().default(default))
    }

    /// Adds every field of `other`, replacing fields with the same name.
    pub fn extend(mut self, other: ObjectSchema) -> Self {
        self.shape.extend(other.shape);
        self
    }

    /// Keeps only the named fields.
    pub fn pick(mut self, names: &[&str]) -> Self {
        self.shape.retain(|key, _| names.contains(&key.as_str()));
        self
    }

    /// Drops the named fields.
    pub fn omit(mut self, names: &[&str]) -> Self {
        self.shape.retain(|key, _| !names.contains(&key.as_str()));
        self
    }

    /// Makes every field optional.
    pub fn partial(mut self) -> Self {
        for schema in self.shape.values_mut() {
            *schema = schema.clone().optional();
        }
        self
    }

    /// Rejects unknown keys.
    pub fn strict(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Strict;
        self
    }

    /// Keeps unknown keys in the output.
    pub fn passthrough(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Passthrough;
        self
    }

    /// Drops unknown keys from the output. This is the default.
    pub fn strip(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Strip;
        self
    }

    /// Validates unknown keys against `schema`.
    pub fn catchall(mut self, schema: impl Into<Schema>) -> Self {
        self.unknown_keys = UnknownKeys::Catchall(schema.into());
        self
    }

    /// An enum of this schema's keys.
    pub fn keyof(&self) -> Schema {
        Schema::enumeration(self.shape.keys().cloned())
    }

    pub fn build(self) -> Schema {
        Schema::from_def(SchemaDef::Object(ObjectDef {
            shape: self.shape,
            unknown_keys: self.unknown_keys,
            plan: Arc::new(OnceLock::new()),
        }))
    }
}

impl Default for ObjectSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        object.build()
    }
}

/// What the merge step needs to know about each processed key.
struct KeyEntry {
    key: String,
    present: bool,
    optional: bool,
    input_undefined: bool,
}

pub(super) fn parse_object(
    schema: &Schema,
    def: &ObjectDef,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = match std::mem::take(&mut payload.value) {
        Value::Object(input) => input,
        other => {
            let issue = Issue::invalid_type("object", &other).with_error_map(schema.node_error());
            payload.value = other;
            payload.push(issue);
            return Ok(Step::Ready(payload));
        }
    };

    let optional = def.plan(ctx);
    let mut entries = Vec::with_capacity(def.shape.len());
    let mut steps = Vec::with_capacity(def.shape.len());
    for ((key, child), optional) in def.shape.iter().zip(optional.iter()) {
        let value = input.get(key).cloned();
        entries.push(KeyEntry {
            key: key.clone(),
            present: value.is_some(),
            optional: *optional,
            input_undefined: value.as_ref().map_or(true, Value::is_undefined),
        });
        steps.push(child.run(ParsePayload::new(value.unwrap_or_default()), ctx)?);
    }

    let mut passthrough = Vec::new();
    let mut unrecognized = Vec::new();
    for (key, value) in input.iter().filter(|(k, _)| !def.shape.contains_key(*k)) {
        match &def.unknown_keys {
            UnknownKeys::Strip => {}
            UnknownKeys::Strict => unrecognized.push(key.clone()),
            UnknownKeys::Passthrough => passthrough.push((key.clone(), value.clone())),
            UnknownKeys::Catchall(catchall) => {
                entries.push(KeyEntry {
                    key: key.clone(),
                    present: true,
                    optional: false,
                    input_undefined: value.is_undefined(),
                });
                steps.push(catchall.run(ParsePayload::new(value.clone()), ctx)?);
            }
        }
    }

    let error_map = schema.node_error().cloned();
    payload::join(steps).then(move |children| {
        let mut output = Object::with_capacity(children.len() + passthrough.len());
        for (entry, child) in entries.into_iter().zip(children) {
            if entry.optional && !child.issues.is_empty() && entry.input_undefined {
                if entry.present {
                    output.insert(entry.key, Value::Undefined);
                }
                continue;
            }
            let value = payload.absorb(child, Some(PathSegment::Field(entry.key.clone())));
            if !value.is_undefined() || entry.present {
                output.insert(entry.key, value);
            }
        }
        output.extend(passthrough);
        if !unrecognized.is_empty() {
            let issue = Issue::new(IssueKind::UnrecognizedKeys { keys: unrecognized })
                .with_input(Value::Object(input))
                .with_error_map(error_map.as_ref());
            payload.push(issue);
        }
        payload.value = Value::Object(output);
        Ok(Step::Ready(payload))
    })
}

//! Union and discriminated-union nodes.
//!
//! A union runs every option against the same input on its own payload and
//! picks, in declaration order, the first valid result, else the first dirty
//! one. Only when every option aborted does it report `invalid_union`.
//!
//! A discriminated union looks up the option by the literal value of one key
//! and delegates to that option alone.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::ParseContext;
use crate::error::{ErrorMap, Issue, IssueKind, SchemaBuildError};
use crate::path::JsonPath;
use crate::payload::{self, ParsePayload, RunResult, Step};
use crate::value::Value;

use super::{Schema, SchemaDef};

/// A hashable form of the literal values a discriminator can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    BigInt(i128),
    String(String),
}

impl LiteralKey {
    fn new(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Undefined => LiteralKey::Undefined,
            Value::Null => LiteralKey::Null,
            Value::Bool(b) => LiteralKey::Bool(*b),
            // -0 and 0 are the same key, as are all NaNs
            Value::Number(n) if *n == 0.0 => LiteralKey::Number(0),
            Value::Number(n) if n.is_nan() => LiteralKey::Number(f64::NAN.to_bits()),
            Value::Number(n) => LiteralKey::Number(n.to_bits()),
            Value::BigInt(n) => LiteralKey::BigInt(*n),
            Value::String(s) => LiteralKey::String(s.clone()),
            _ => return None,
        })
    }
}

#[derive(Clone)]
pub(crate) struct DiscriminatedUnionDef {
    discriminator: String,
    options: Vec<Schema>,
    union_fallback: bool,
    lookup: Arc<HashMap<LiteralKey, usize>>,
}

impl DiscriminatedUnionDef {
    pub(super) fn prop_values(&self) -> IndexMap<String, Vec<Value>> {
        self.options
            .iter()
            .map(Schema::prop_values)
            .fold(IndexMap::new(), super::merge_prop_values)
    }
}

/// Builder returned by [`Schema::discriminated_union`].
///
/// # Example
///
/// ```rust
/// use sieve::Schema;
/// use serde_json::json;
///
/// let shape = Schema::discriminated_union("kind")
///     .option(
///         Schema::object()
///             .field("kind", Schema::literal("circle"))
///             .field("radius", Schema::number()),
///     )
///     .option(
///         Schema::object()
///             .field("kind", Schema::literal("square"))
///             .field("side", Schema::number()),
///     )
///     .build()
///     .unwrap();
///
/// assert!(shape.parse(json!({"kind": "square", "side": 2})).is_ok());
/// assert!(shape.parse(json!({"kind": "triangle"})).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DiscriminatedUnionBuilder {
    discriminator: String,
    options: Vec<Schema>,
    union_fallback: bool,
}

impl DiscriminatedUnionBuilder {
    pub(super) fn new(discriminator: impl Into<String>) -> Self {
        Self {
            discriminator: discriminator.into(),
            options: Vec::new(),
            union_fallback: false,
        }
    }

    pub fn option(mut self, option: impl Into<Schema>) -> Self {
        self.options.push(option.into());
        self
    }

    /// When no option matches the discriminator, evaluate all options as a
    /// plain union instead of failing.
    pub fn union_fallback(mut self, enabled: bool) -> Self {
        self.union_fallback = enabled;
        self
    }

    /// Builds the discriminator lookup table.
    ///
    /// Fails if an option has no literal values for the discriminator key, or
    /// if two options claim the same value.
    pub fn build(self) -> Result<Schema, SchemaBuildError> {
        let mut lookup = HashMap::new();
        for (index, option) in self.options.iter().enumerate() {
            let values = option
                .prop_values()
                .shift_remove(&self.discriminator)
                .unwrap_or_default();
            let keys: Vec<(LiteralKey, Value)> = values
                .into_iter()
                .filter_map(|v| LiteralKey::new(&v).map(|k| (k, v)))
                .collect();
            if keys.is_empty() {
                return Err(SchemaBuildError::MissingDiscriminator {
                    discriminator: self.discriminator,
                    index,
                });
            }
            for (key, value) in keys {
                if lookup.insert(key, index).is_some() {
                    return Err(SchemaBuildError::DuplicateDiscriminator {
                        discriminator: self.discriminator,
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(Schema::from_def(SchemaDef::DiscriminatedUnion(
            DiscriminatedUnionDef {
                discriminator: self.discriminator,
                options: self.options,
                union_fallback: self.union_fallback,
                lookup: Arc::new(lookup),
            },
        )))
    }
}

pub(super) fn parse_union(
    schema: &Schema,
    options: &[Schema],
    payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let mut steps = Vec::with_capacity(options.len());
    let mut pending = false;
    for option in options {
        let step = option.run(ParsePayload::new(payload.value.clone()), ctx)?;
        match step {
            Step::Ready(result) if !pending && result.issues.is_empty() => {
                return Ok(Step::Ready(adopt(payload, result)));
            }
            Step::Pending(_) => pending = true,
            Step::Ready(_) => {}
        }
        steps.push(step);
    }

    let error_map = schema.node_error().cloned();
    payload::join(steps).then(move |results| Ok(Step::Ready(resolve(payload, results, error_map))))
}

/// Takes an option's result as the union's, keeping issues the payload
/// already carried.
fn adopt(mut payload: ParsePayload, result: ParsePayload) -> ParsePayload {
    let value = payload.absorb(result, None);
    payload.value = value;
    payload
}

fn resolve(
    mut payload: ParsePayload,
    results: Vec<ParsePayload>,
    error_map: Option<ErrorMap>,
) -> ParsePayload {
    let chosen = results
        .iter()
        .position(|r| r.issues.is_empty())
        .or_else(|| results.iter().position(|r| !r.is_aborted()));
    if let Some(index) = chosen {
        if let Some(result) = results.into_iter().nth(index) {
            return adopt(payload, result);
        }
        return payload;
    }
    let issue = Issue::new(IssueKind::InvalidUnion {
        errors: results.into_iter().map(|r| r.issues).collect(),
        note: None,
        discriminator: None,
    })
    .with_input(payload.value.clone())
    .with_error_map(error_map.as_ref());
    payload.push(issue);
    payload
}

pub(super) fn parse_discriminated(
    schema: &Schema,
    def: &DiscriminatedUnionDef,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let tag = match &payload.value {
        Value::Object(object) => object
            .get(&def.discriminator)
            .cloned()
            .unwrap_or_default(),
        other => {
            let issue = Issue::invalid_type("object", other).with_error_map(schema.node_error());
            payload.push(issue);
            return Ok(Step::Ready(payload));
        }
    };

    let option = LiteralKey::new(&tag).and_then(|key| def.lookup.get(&key).copied());
    if let Some(index) = option {
        tracing::trace!(
            discriminator = %def.discriminator,
            option = index,
            "dispatching discriminated union"
        );
        return def.options[index].run(payload, ctx);
    }
    if def.union_fallback {
        return parse_union(schema, &def.options, payload, ctx);
    }
    let issue = Issue::new(IssueKind::InvalidUnion {
        errors: Vec::new(),
        note: Some("No matching discriminator".to_string()),
        discriminator: Some(def.discriminator.clone()),
    })
    .with_path(JsonPath::from_field(def.discriminator.clone()))
    .with_input(payload.value.clone())
    .with_error_map(schema.node_error());
    payload.push(issue);
    Ok(Step::Ready(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Check;
    use serde_json::json;

    fn shape() -> Schema {
        Schema::discriminated_union("kind")
            .option(
                Schema::object()
                    .field("kind", Schema::literal("x"))
                    .field("value", Schema::number()),
            )
            .option(
                Schema::object()
                    .field("kind", Schema::literal("y"))
                    .field("value", Schema::string()),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_valid_wins() {
        let schema = Schema::union([
            Schema::string().transform(|_| Value::from("first")),
            Schema::string().transform(|_| Value::from("second")),
        ]);
        assert_eq!(schema.parse("x").unwrap(), Value::from("first"));
    }

    #[test]
    fn test_dirty_option_short_circuits() {
        let schema = Schema::union([
            Schema::string().check(Check::min_length(5)),
            Schema::number(),
        ]);
        let errors = schema.safe_parse("abc").unwrap().into_result().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().code(), "too_small");
    }

    #[test]
    fn test_all_aborted_reports_invalid_union() {
        let schema = Schema::union([Schema::string(), Schema::number()]);
        let errors = schema.safe_parse(true).unwrap().into_result().unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors.first().kind {
            IssueKind::InvalidUnion { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0][0].code(), "invalid_type");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_discriminator_dispatches_to_one_option() {
        let schema = shape();
        assert!(schema.parse(json!({"kind": "x", "value": 1})).is_ok());

        // Option "x" would accept this, but only "y" is consulted.
        let errors = schema
            .safe_parse(json!({"kind": "y", "value": 1}))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().code(), "invalid_type");
        assert_eq!(errors.first().path.to_string(), "value");
    }

    #[test]
    fn test_unknown_discriminator() {
        let errors = shape()
            .safe_parse(json!({"kind": "z"}))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.first().code(), "invalid_union");
        assert_eq!(errors.first().path.to_string(), "kind");
    }

    #[test]
    fn test_union_fallback() {
        let schema = Schema::discriminated_union("kind")
            .option(Schema::object().field("kind", Schema::literal("a")))
            .option(
                Schema::object()
                    .field("kind", Schema::literal("b"))
                    .passthrough(),
            )
            .union_fallback(true)
            .build()
            .unwrap();
        let errors = schema
            .safe_parse(json!({"kind": "c"}))
            .unwrap()
            .into_result()
            .unwrap_err();
        match &errors.first().kind {
            IssueKind::InvalidUnion { errors, .. } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_discriminator_rejected_at_build() {
        let err = Schema::discriminated_union("kind")
            .option(Schema::object().field("kind", Schema::literal("a")))
            .option(Schema::object().field("kind", Schema::enumeration(["b", "a"])))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaBuildError::DuplicateDiscriminator {
                discriminator: "kind".to_string(),
                value: "\"a\"".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_discriminator_rejected_at_build() {
        let err = Schema::discriminated_union("kind")
            .option(Schema::object().field("kind", Schema::string()))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaBuildError::MissingDiscriminator {
                discriminator: "kind".to_string(),
                index: 0,
            }
        );
    }

    #[test]
    fn test_nested_discriminated_unions() {
        let inner = Schema::discriminated_union("kind")
            .option(Schema::object().field("kind", Schema::literal("a")))
            .option(Schema::object().field("kind", Schema::literal("b")))
            .build()
            .unwrap();
        let outer = Schema::discriminated_union("kind")
            .option(inner)
            .option(Schema::object().field("kind", Schema::literal("c")))
            .build()
            .unwrap();
        assert!(outer.parse(json!({"kind": "b"})).is_ok());
        assert!(outer.parse(json!({"kind": "c"})).is_ok());
    }
}

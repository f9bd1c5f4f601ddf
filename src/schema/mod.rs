//! Schema definitions.
//!
//! A [`Schema`] is a cheap-to-clone handle over an immutable node. Every node
//! holds a definition ([`SchemaTag`] plus tag-specific parameters), an ordered
//! list of [`Check`]s and lazily derived metadata. Running a node dispatches
//! on its definition, then runs its checks. Nothing here throws on invalid
//! input: failures are accumulated as issues on the payload.
//!
//! # Example
//!
//! ```rust
//! use sieve::{Check, Schema};
//! use serde_json::json;
//!
//! let user = Schema::object()
//!     .field("name", Schema::string().check(Check::min_length(1)))
//!     .field("age", Schema::number().check(Check::int()))
//!     .optional("email", Schema::string())
//!     .build();
//!
//! let result = user.safe_parse(json!({"name": "Ada", "age": 36})).unwrap();
//! assert!(result.is_success());
//!
//! // Every failing field is reported in one pass.
//! let result = user.safe_parse(json!({"name": "", "age": 1.5})).unwrap();
//! assert_eq!(result.into_result().unwrap_err().len(), 2);
//! ```

mod array;
mod collection;
mod effect;
mod intersection;
mod literal;
mod object;
mod primitive;
mod union;
mod wrapper;

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::check::{self, Check, RefinementCtx};
use crate::context::ParseContext;
use crate::error::{ErrorMap, SchemaBuildError};
use crate::payload::{ParsePayload, RunResult, Step};
use crate::value::Value;

pub use literal::TemplatePart;
pub use object::ObjectSchema;
pub use union::DiscriminatedUnionBuilder;
pub use wrapper::CatchContext;

pub(crate) use object::ObjectDef;
pub(crate) use union::DiscriminatedUnionDef;

pub(crate) type TransformFn = Arc<dyn Fn(Value, &mut RefinementCtx) -> Value + Send + Sync>;
pub(crate) type AsyncTransformFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Value> + Send + Sync>;
type ThunkFn = Arc<dyn Fn() -> Schema + Send + Sync>;

/// The kind of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaTag {
    String,
    Number,
    Boolean,
    BigInt,
    Date,
    Literal,
    Enum,
    Any,
    Unknown,
    Never,
    Void,
    Undefined,
    Null,
    Symbol,
    File,
    Array,
    Object,
    Union,
    DiscriminatedUnion,
    Intersection,
    Tuple,
    Record,
    Map,
    Set,
    Optional,
    Nullable,
    Default,
    Prefault,
    NonOptional,
    Catch,
    Success,
    Transform,
    Custom,
    Pipe,
    Readonly,
    TemplateLiteral,
    Promise,
    Lazy,
}

/// A value substituted by `default`/`prefault`, fixed or computed per parse.
#[derive(Clone)]
pub(crate) enum DefaultValue {
    Fixed(Value),
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub(crate) fn get(&self) -> Value {
        match self {
            DefaultValue::Fixed(value) => value.clone(),
            DefaultValue::Computed(f) => f(),
        }
    }
}

#[derive(Clone)]
pub(crate) enum CatchValue {
    Fixed(Value),
    Computed(Arc<dyn Fn(&CatchContext) -> Value + Send + Sync>),
}

#[derive(Clone)]
pub(crate) enum Transform {
    Sync(TransformFn),
    Async(AsyncTransformFn),
}

/// Where a lazy node finds its target.
#[derive(Clone)]
pub(crate) enum LazySource {
    /// Invoked on first use, then memoized.
    Thunk {
        thunk: ThunkFn,
        resolved: Arc<OnceLock<Schema>>,
    },
    /// A strong handle, used for the outer node of [`Schema::recursive`].
    Fixed(Schema),
    /// A back reference into an enclosing recursive schema.
    Back(Weak<SchemaNode>),
}

#[derive(Clone)]
pub(crate) enum SchemaDef {
    String { coerce: bool },
    Number { coerce: bool },
    Boolean { coerce: bool },
    BigInt { coerce: bool },
    Date { coerce: bool },
    Literal(Vec<Value>),
    Enum(Vec<Value>),
    Any,
    Unknown,
    Never,
    Void,
    Undefined,
    Null,
    Symbol,
    File,
    Array(Schema),
    Object(ObjectDef),
    Union(Vec<Schema>),
    DiscriminatedUnion(DiscriminatedUnionDef),
    Intersection(Schema, Schema),
    Tuple {
        items: Vec<Schema>,
        rest: Option<Schema>,
    },
    Record {
        key: Schema,
        value: Schema,
    },
    Map {
        key: Schema,
        value: Schema,
    },
    Set(Schema),
    Optional(Schema),
    Nullable(Schema),
    Default(Schema, DefaultValue),
    Prefault(Schema, DefaultValue),
    NonOptional(Schema),
    Catch(Schema, CatchValue),
    Success(Schema),
    Transform(Transform),
    Custom,
    Pipe(Schema, Schema),
    Readonly(Schema),
    TemplateLiteral(literal::TemplateDef),
    Promise(Schema),
    Lazy(LazySource),
}

#[derive(Clone, Default)]
struct Metadata {
    optin: OnceLock<bool>,
    optout: OnceLock<bool>,
    values: OnceLock<Option<Vec<Value>>>,
    pattern: OnceLock<Option<String>>,
}

#[derive(Clone)]
pub(crate) struct SchemaNode {
    pub(crate) def: SchemaDef,
    pub(crate) checks: Vec<Check>,
    pub(crate) error: Option<ErrorMap>,
    meta: Metadata,
}

impl SchemaNode {
    fn new(def: SchemaDef) -> Self {
        Self {
            def,
            checks: Vec::new(),
            error: None,
            meta: Metadata::default(),
        }
    }
}

/// A validation schema.
///
/// Schemas are immutable; builder methods return a new handle and leave the
/// original untouched. Cloning is an `Arc` clone, so schemas can be shared
/// freely across threads.
#[derive(Clone)]
pub struct Schema(pub(crate) Arc<SchemaNode>);

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("tag", &self.tag())
            .field("checks", &self.0.checks.len())
            .finish()
    }
}

impl Schema {
    pub(crate) fn from_def(def: SchemaDef) -> Self {
        Schema(Arc::new(SchemaNode::new(def)))
    }

    /// Applies `f` to a private copy of the node, dropping derived metadata.
    fn modify(mut self, f: impl FnOnce(&mut SchemaNode)) -> Self {
        let node = Arc::make_mut(&mut self.0);
        f(node);
        node.meta = Metadata::default();
        self
    }

    pub(crate) fn def(&self) -> &SchemaDef {
        &self.0.def
    }

    pub(crate) fn checks(&self) -> &[Check] {
        &self.0.checks
    }

    pub(crate) fn node_error(&self) -> Option<&ErrorMap> {
        self.0.error.as_ref()
    }

    // Leaves

    pub fn string() -> Self {
        Self::from_def(SchemaDef::String { coerce: false })
    }

    /// A finite number. `NaN` and infinities are rejected.
    pub fn number() -> Self {
        Self::from_def(SchemaDef::Number { coerce: false })
    }

    pub fn boolean() -> Self {
        Self::from_def(SchemaDef::Boolean { coerce: false })
    }

    pub fn bigint() -> Self {
        Self::from_def(SchemaDef::BigInt { coerce: false })
    }

    pub fn date() -> Self {
        Self::from_def(SchemaDef::Date { coerce: false })
    }

    /// Accepts exactly `value`.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_def(SchemaDef::Literal(vec![value.into()]))
    }

    /// Accepts any of `values`.
    pub fn literals<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::from_def(SchemaDef::Literal(values.into_iter().map(Into::into).collect()))
    }

    /// Accepts any of the given options.
    ///
    /// ```rust
    /// use sieve::Schema;
    ///
    /// let color = Schema::enumeration(["red", "green"]);
    /// assert!(color.parse("red").is_ok());
    /// assert!(color.parse("blue").is_err());
    /// ```
    pub fn enumeration<V: Into<Value>>(options: impl IntoIterator<Item = V>) -> Self {
        Self::from_def(SchemaDef::Enum(options.into_iter().map(Into::into).collect()))
    }

    pub fn any() -> Self {
        Self::from_def(SchemaDef::Any)
    }

    pub fn unknown() -> Self {
        Self::from_def(SchemaDef::Unknown)
    }

    /// Rejects every input.
    pub fn never() -> Self {
        Self::from_def(SchemaDef::Never)
    }

    pub fn void() -> Self {
        Self::from_def(SchemaDef::Void)
    }

    pub fn undefined() -> Self {
        Self::from_def(SchemaDef::Undefined)
    }

    pub fn null() -> Self {
        Self::from_def(SchemaDef::Null)
    }

    pub fn symbol() -> Self {
        Self::from_def(SchemaDef::Symbol)
    }

    pub fn file() -> Self {
        Self::from_def(SchemaDef::File)
    }

    /// Builds a schema matching strings made of `parts` in sequence.
    ///
    /// Every schema part must expose a pattern (strings, numbers, booleans,
    /// bigints, literals, enums, null, undefined and optional/nullable
    /// wrappers of those).
    ///
    /// ```rust
    /// use sieve::{Schema, TemplatePart};
    ///
    /// let size = Schema::template_literal([
    ///     TemplatePart::from(Schema::number()),
    ///     TemplatePart::from(Schema::enumeration(["px", "em"])),
    /// ])
    /// .unwrap();
    ///
    /// assert!(size.parse("12px").is_ok());
    /// assert!(size.parse("12pt").is_err());
    /// ```
    pub fn template_literal(
        parts: impl IntoIterator<Item = TemplatePart>,
    ) -> Result<Self, SchemaBuildError> {
        literal::TemplateDef::new(parts.into_iter().collect())
            .map(|def| Self::from_def(SchemaDef::TemplateLiteral(def)))
    }

    // Composites

    pub fn array(element: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Array(element.into()))
    }

    /// Starts an object schema. Unknown keys are stripped unless configured
    /// otherwise.
    pub fn object() -> ObjectSchema {
        ObjectSchema::new()
    }

    /// Accepts the first option that validates, in declaration order.
    pub fn union(options: impl IntoIterator<Item = Schema>) -> Self {
        Self::from_def(SchemaDef::Union(options.into_iter().collect()))
    }

    /// Starts a union that dispatches on the literal value of `discriminator`.
    pub fn discriminated_union(discriminator: impl Into<String>) -> DiscriminatedUnionBuilder {
        DiscriminatedUnionBuilder::new(discriminator)
    }

    /// Requires both schemas and deep-merges their outputs.
    pub fn intersection(left: impl Into<Schema>, right: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Intersection(left.into(), right.into()))
    }

    pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Self {
        Self::from_def(SchemaDef::Tuple {
            items: items.into_iter().collect(),
            rest: None,
        })
    }

    /// A tuple whose elements past `items` are validated against `rest`.
    pub fn tuple_with_rest(items: impl IntoIterator<Item = Schema>, rest: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Tuple {
            items: items.into_iter().collect(),
            rest: Some(rest.into()),
        })
    }

    /// An object with arbitrary keys. When `key` enumerates its values (a
    /// literal or enum), every value is required and extra keys are rejected.
    pub fn record(key: impl Into<Schema>, value: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Record {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn map(key: impl Into<Schema>, value: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Map {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn set(element: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Set(element.into()))
    }

    /// Accepts a [`Value::Promise`] (or any plain value) and validates what it
    /// resolves to. Only usable from the async entry points.
    pub fn promise(inner: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Promise(inner.into()))
    }

    /// Accepts anything `f` approves of.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::from_def(SchemaDef::Custom).check(Check::refine(f))
    }

    /// Defers building the target schema until it is first used.
    pub fn lazy<F>(thunk: F) -> Self
    where
        F: Fn() -> Schema + Send + Sync + 'static,
    {
        Self::from_def(SchemaDef::Lazy(LazySource::Thunk {
            thunk: Arc::new(thunk),
            resolved: Arc::new(OnceLock::new()),
        }))
    }

    /// Builds a self-referential schema. `f` receives a handle to the schema
    /// being defined.
    ///
    /// ```rust
    /// use sieve::Schema;
    /// use serde_json::json;
    ///
    /// let tree = Schema::recursive(|tree| {
    ///     Schema::object()
    ///         .field("value", Schema::number())
    ///         .field("children", Schema::array(tree))
    ///         .build()
    /// });
    ///
    /// let input = json!({"value": 1, "children": [{"value": 2, "children": []}]});
    /// assert!(tree.parse(input).is_ok());
    /// ```
    pub fn recursive<F>(f: F) -> Self
    where
        F: FnOnce(Schema) -> Schema,
    {
        let body = Arc::new_cyclic(|weak: &Weak<SchemaNode>| {
            let this = Self::from_def(SchemaDef::Lazy(LazySource::Back(weak.clone())));
            let built = f(this);
            Arc::try_unwrap(built.0).unwrap_or_else(|shared| (*shared).clone())
        });
        Self::from_def(SchemaDef::Lazy(LazySource::Fixed(Schema(body))))
    }

    // Wrappers

    /// Accepts `undefined` in addition to what `self` accepts.
    pub fn optional(self) -> Self {
        Self::from_def(SchemaDef::Optional(self))
    }

    pub fn nullable(self) -> Self {
        Self::from_def(SchemaDef::Nullable(self))
    }

    /// Accepts both `null` and `undefined`.
    pub fn nullish(self) -> Self {
        self.nullable().optional()
    }

    /// Substitutes `value` for `undefined` input. The default is not
    /// validated against `self`.
    pub fn default(self, value: impl Into<Value>) -> Self {
        Self::from_def(SchemaDef::Default(self, DefaultValue::Fixed(value.into())))
    }

    pub fn default_with<F>(self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::from_def(SchemaDef::Default(self, DefaultValue::Computed(Arc::new(f))))
    }

    /// Substitutes `value` for `undefined` input, then validates it.
    pub fn prefault(self, value: impl Into<Value>) -> Self {
        Self::from_def(SchemaDef::Prefault(self, DefaultValue::Fixed(value.into())))
    }

    pub fn prefault_with<F>(self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::from_def(SchemaDef::Prefault(self, DefaultValue::Computed(Arc::new(f))))
    }

    /// Rejects an `undefined` result.
    pub fn non_optional(self) -> Self {
        Self::from_def(SchemaDef::NonOptional(self))
    }

    /// Replaces any failing result with `value`.
    pub fn catch(self, value: impl Into<Value>) -> Self {
        Self::from_def(SchemaDef::Catch(self, CatchValue::Fixed(value.into())))
    }

    /// Replaces any failing result with what `f` computes from the discarded
    /// issues and the original input.
    pub fn catch_with<F>(self, f: F) -> Self
    where
        F: Fn(&CatchContext) -> Value + Send + Sync + 'static,
    {
        Self::from_def(SchemaDef::Catch(self, CatchValue::Computed(Arc::new(f))))
    }

    /// Outputs whether `self` accepted the input. Never fails.
    pub fn success(self) -> Self {
        Self::from_def(SchemaDef::Success(self))
    }

    /// Validates with `self`, then maps the output through `f`.
    pub fn transform<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.pipe(Self::from_def(SchemaDef::Transform(Transform::Sync(Arc::new(
            move |value, _ctx| f(value),
        )))))
    }

    /// Like [`transform`](Self::transform), but `f` may report issues.
    pub fn transform_with<F>(self, f: F) -> Self
    where
        F: Fn(Value, &mut RefinementCtx) -> Value + Send + Sync + 'static,
    {
        self.pipe(Self::from_def(SchemaDef::Transform(Transform::Sync(Arc::new(f)))))
    }

    /// Asynchronous [`transform`](Self::transform).
    pub fn transform_async<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Value> + Send + 'static,
    {
        self.pipe(Self::from_def(SchemaDef::Transform(Transform::Async(Arc::new(
            move |value| f(value).boxed(),
        )))))
    }

    /// Feeds the output of `self` into `next`, unless `self` aborted.
    pub fn pipe(self, next: impl Into<Schema>) -> Self {
        Self::from_def(SchemaDef::Pipe(self, next.into()))
    }

    pub fn readonly(self) -> Self {
        Self::from_def(SchemaDef::Readonly(self))
    }

    pub fn or(self, other: impl Into<Schema>) -> Self {
        Self::union([self, other.into()])
    }

    pub fn and(self, other: impl Into<Schema>) -> Self {
        Self::intersection(self, other)
    }

    // Modifiers

    /// Appends a check.
    pub fn check(self, check: Check) -> Self {
        self.modify(|node| node.checks.push(check))
    }

    /// Shorthand for `check(Check::refine(f))`.
    pub fn refine<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.check(Check::refine(f))
    }

    /// Shorthand for `check(Check::super_refine(f))`.
    pub fn super_refine<F>(self, f: F) -> Self
    where
        F: Fn(&Value, &mut RefinementCtx) + Send + Sync + 'static,
    {
        self.check(Check::super_refine(f))
    }

    /// Enables input coercion on string, number, boolean, bigint and date
    /// schemas. Other schemas are returned unchanged.
    ///
    /// ```rust
    /// use sieve::{Schema, Value};
    ///
    /// let port = Schema::number().coerce();
    /// assert_eq!(port.parse("8080").unwrap(), Value::Number(8080.0));
    /// ```
    pub fn coerce(self) -> Self {
        self.modify(|node| match &mut node.def {
            SchemaDef::String { coerce }
            | SchemaDef::Number { coerce }
            | SchemaDef::Boolean { coerce }
            | SchemaDef::BigInt { coerce }
            | SchemaDef::Date { coerce } => *coerce = true,
            _ => {}
        })
    }

    /// Sets a fixed message for every issue this node raises.
    pub fn error(self, message: impl Into<String>) -> Self {
        self.error_map(ErrorMap::message(message))
    }

    /// Sets an error map for every issue this node raises.
    pub fn error_map(self, map: ErrorMap) -> Self {
        self.modify(|node| node.error = Some(map))
    }

    // Metadata

    pub fn tag(&self) -> SchemaTag {
        match &self.0.def {
            SchemaDef::String { .. } => SchemaTag::String,
            SchemaDef::Number { .. } => SchemaTag::Number,
            SchemaDef::Boolean { .. } => SchemaTag::Boolean,
            SchemaDef::BigInt { .. } => SchemaTag::BigInt,
            SchemaDef::Date { .. } => SchemaTag::Date,
            SchemaDef::Literal(_) => SchemaTag::Literal,
            SchemaDef::Enum(_) => SchemaTag::Enum,
            SchemaDef::Any => SchemaTag::Any,
            SchemaDef::Unknown => SchemaTag::Unknown,
            SchemaDef::Never => SchemaTag::Never,
            SchemaDef::Void => SchemaTag::Void,
            SchemaDef::Undefined => SchemaTag::Undefined,
            SchemaDef::Null => SchemaTag::Null,
            SchemaDef::Symbol => SchemaTag::Symbol,
            SchemaDef::File => SchemaTag::File,
            SchemaDef::Array(_) => SchemaTag::Array,
            SchemaDef::Object(_) => SchemaTag::Object,
            SchemaDef::Union(_) => SchemaTag::Union,
            SchemaDef::DiscriminatedUnion(_) => SchemaTag::DiscriminatedUnion,
            SchemaDef::Intersection(..) => SchemaTag::Intersection,
            SchemaDef::Tuple { .. } => SchemaTag::Tuple,
            SchemaDef::Record { .. } => SchemaTag::Record,
            SchemaDef::Map { .. } => SchemaTag::Map,
            SchemaDef::Set(_) => SchemaTag::Set,
            SchemaDef::Optional(_) => SchemaTag::Optional,
            SchemaDef::Nullable(_) => SchemaTag::Nullable,
            SchemaDef::Default(..) => SchemaTag::Default,
            SchemaDef::Prefault(..) => SchemaTag::Prefault,
            SchemaDef::NonOptional(_) => SchemaTag::NonOptional,
            SchemaDef::Catch(..) => SchemaTag::Catch,
            SchemaDef::Success(_) => SchemaTag::Success,
            SchemaDef::Transform(_) => SchemaTag::Transform,
            SchemaDef::Custom => SchemaTag::Custom,
            SchemaDef::Pipe(..) => SchemaTag::Pipe,
            SchemaDef::Readonly(_) => SchemaTag::Readonly,
            SchemaDef::TemplateLiteral(_) => SchemaTag::TemplateLiteral,
            SchemaDef::Promise(_) => SchemaTag::Promise,
            SchemaDef::Lazy(_) => SchemaTag::Lazy,
        }
    }

    /// Whether `undefined` (or a missing key) is acceptable input.
    pub fn optin(&self) -> bool {
        *self.0.meta.optin.get_or_init(|| match &self.0.def {
            SchemaDef::Optional(_)
            | SchemaDef::Default(..)
            | SchemaDef::Prefault(..)
            | SchemaDef::Undefined => true,
            SchemaDef::Nullable(inner)
            | SchemaDef::Readonly(inner)
            | SchemaDef::Catch(inner, _)
            | SchemaDef::Success(inner)
            | SchemaDef::Pipe(inner, _) => inner.optin(),
            SchemaDef::Union(options) => options.iter().any(Schema::optin),
            SchemaDef::Lazy(source) => source.resolve().map(|s| s.optin()).unwrap_or(false),
            _ => false,
        })
    }

    /// Whether this schema may output `undefined`.
    pub fn optout(&self) -> bool {
        *self.0.meta.optout.get_or_init(|| match &self.0.def {
            SchemaDef::Optional(_) | SchemaDef::Undefined => true,
            SchemaDef::Nullable(inner)
            | SchemaDef::Readonly(inner)
            | SchemaDef::Catch(inner, _) => inner.optout(),
            SchemaDef::Pipe(_, out) => out.optout(),
            SchemaDef::Union(options) => options.iter().any(Schema::optout),
            SchemaDef::Lazy(source) => source.resolve().map(|s| s.optout()).unwrap_or(false),
            _ => false,
        })
    }

    /// The finite set of values this schema accepts, when it has one.
    pub fn values(&self) -> Option<Vec<Value>> {
        self.0
            .meta
            .values
            .get_or_init(|| match &self.0.def {
                SchemaDef::Literal(values) | SchemaDef::Enum(values) => Some(values.clone()),
                SchemaDef::Null => Some(vec![Value::Null]),
                SchemaDef::Undefined => Some(vec![Value::Undefined]),
                SchemaDef::Optional(inner) => with_value(inner.values(), Value::Undefined),
                SchemaDef::Nullable(inner) => with_value(inner.values(), Value::Null),
                SchemaDef::NonOptional(inner) => inner
                    .values()
                    .map(|values| values.into_iter().filter(|v| !v.is_undefined()).collect()),
                SchemaDef::Default(inner, _)
                | SchemaDef::Prefault(inner, _)
                | SchemaDef::Readonly(inner)
                | SchemaDef::Catch(inner, _)
                | SchemaDef::Pipe(inner, _) => inner.values(),
                SchemaDef::Lazy(source) => source.resolve().ok().and_then(|s| s.values()),
                _ => None,
            })
            .clone()
    }

    /// Unanchored regex source describing the string form of accepted values.
    pub fn pattern(&self) -> Option<String> {
        self.0
            .meta
            .pattern
            .get_or_init(|| match &self.0.def {
                SchemaDef::String { .. } => Some(r"[\s\S]*".to_string()),
                SchemaDef::Number { .. } => Some(r"-?\d+(?:\.\d+)?".to_string()),
                SchemaDef::Boolean { .. } => Some("true|false".to_string()),
                SchemaDef::BigInt { .. } => Some(r"-?\d+n?".to_string()),
                SchemaDef::Null => Some("null".to_string()),
                SchemaDef::Undefined => Some("undefined".to_string()),
                SchemaDef::Literal(values) | SchemaDef::Enum(values) => {
                    Some(literal::alternation(values))
                }
                SchemaDef::TemplateLiteral(def) => Some(def.source().to_string()),
                SchemaDef::Optional(inner) => inner.pattern().map(|p| format!("(?:{})?", p)),
                SchemaDef::Nullable(inner) => inner.pattern().map(|p| format!("(?:{})|null", p)),
                SchemaDef::Readonly(inner) | SchemaDef::Default(inner, _) => inner.pattern(),
                SchemaDef::Lazy(source) => source.resolve().ok().and_then(|s| s.pattern()),
                _ => None,
            })
            .clone()
    }

    /// Literal values of each property, for discriminator lookup.
    pub(crate) fn prop_values(&self) -> IndexMap<String, Vec<Value>> {
        match &self.0.def {
            SchemaDef::Object(def) => def.prop_values(),
            SchemaDef::DiscriminatedUnion(def) => def.prop_values(),
            SchemaDef::Intersection(left, right) => {
                merge_prop_values(left.prop_values(), right.prop_values())
            }
            SchemaDef::Pipe(inner, _) | SchemaDef::Readonly(inner) => inner.prop_values(),
            SchemaDef::Lazy(source) => source
                .resolve()
                .map(|s| s.prop_values())
                .unwrap_or_default(),
            _ => IndexMap::new(),
        }
    }

    // Execution

    /// Runs this node and its checks.
    pub(crate) fn run(&self, payload: ParsePayload, ctx: &ParseContext) -> RunResult {
        let core = self.run_core(payload, ctx)?;
        if self.0.checks.is_empty() {
            return Ok(core);
        }
        match core {
            Step::Ready(payload) => check::run_checks(self, payload, ctx),
            pending => {
                let schema = self.clone();
                let ctx = ctx.clone();
                pending.then(move |payload| check::run_checks(&schema, payload, &ctx))
            }
        }
    }

    fn run_core(&self, payload: ParsePayload, ctx: &ParseContext) -> RunResult {
        match &self.0.def {
            SchemaDef::String { .. }
            | SchemaDef::Number { .. }
            | SchemaDef::Boolean { .. }
            | SchemaDef::BigInt { .. }
            | SchemaDef::Date { .. }
            | SchemaDef::Any
            | SchemaDef::Unknown
            | SchemaDef::Never
            | SchemaDef::Void
            | SchemaDef::Undefined
            | SchemaDef::Null
            | SchemaDef::Symbol
            | SchemaDef::File
            | SchemaDef::Custom => Ok(Step::Ready(primitive::parse(self, payload))),
            SchemaDef::Literal(values) | SchemaDef::Enum(values) => {
                Ok(Step::Ready(literal::parse_literal(self, values, payload)))
            }
            SchemaDef::TemplateLiteral(def) => {
                Ok(Step::Ready(literal::parse_template(self, def, payload)))
            }
            SchemaDef::Array(element) => array::parse_array(self, element, payload, ctx),
            SchemaDef::Tuple { items, rest } => {
                array::parse_tuple(self, items, rest.as_ref(), payload, ctx)
            }
            SchemaDef::Object(def) => object::parse_object(self, def, payload, ctx),
            SchemaDef::Union(options) => union::parse_union(self, options, payload, ctx),
            SchemaDef::DiscriminatedUnion(def) => {
                union::parse_discriminated(self, def, payload, ctx)
            }
            SchemaDef::Intersection(left, right) => {
                intersection::parse_intersection(left, right, payload, ctx)
            }
            SchemaDef::Record { key, value } => {
                collection::parse_record(self, key, value, payload, ctx)
            }
            SchemaDef::Map { key, value } => collection::parse_map(self, key, value, payload, ctx),
            SchemaDef::Set(element) => collection::parse_set(self, element, payload, ctx),
            SchemaDef::Optional(inner) => wrapper::parse_optional(inner, payload, ctx),
            SchemaDef::Nullable(inner) => wrapper::parse_nullable(inner, payload, ctx),
            SchemaDef::Default(inner, value) => wrapper::parse_default(inner, value, payload, ctx),
            SchemaDef::Prefault(inner, value) => {
                wrapper::parse_prefault(inner, value, payload, ctx)
            }
            SchemaDef::NonOptional(inner) => {
                wrapper::parse_non_optional(self, inner, payload, ctx)
            }
            SchemaDef::Catch(inner, value) => wrapper::parse_catch(inner, value, payload, ctx),
            SchemaDef::Success(inner) => wrapper::parse_success(inner, payload, ctx),
            SchemaDef::Readonly(inner) => inner.run(payload, ctx),
            SchemaDef::Promise(inner) => wrapper::parse_promise(inner, payload, ctx),
            SchemaDef::Transform(transform) => {
                effect::parse_transform(self, transform, payload, ctx)
            }
            SchemaDef::Pipe(first, second) => effect::parse_pipe(first, second, payload, ctx),
            SchemaDef::Lazy(source) => effect::parse_lazy(source, payload, ctx),
        }
    }
}

impl LazySource {
    pub(crate) fn resolve(&self) -> Result<Schema, crate::error::EngineError> {
        match self {
            LazySource::Thunk { thunk, resolved } => Ok(resolved
                .get_or_init(|| {
                    tracing::trace!("resolving lazy schema");
                    thunk()
                })
                .clone()),
            LazySource::Fixed(schema) => Ok(schema.clone()),
            LazySource::Back(weak) => weak
                .upgrade()
                .map(Schema)
                .ok_or(crate::error::EngineError::UnresolvedLazy),
        }
    }
}

fn with_value(values: Option<Vec<Value>>, extra: Value) -> Option<Vec<Value>> {
    values.map(|mut values| {
        if !values.contains(&extra) {
            values.push(extra);
        }
        values
    })
}

fn merge_prop_values(
    mut left: IndexMap<String, Vec<Value>>,
    right: IndexMap<String, Vec<Value>>,
) -> IndexMap<String, Vec<Value>> {
    for (key, values) in right {
        let entry = left.entry(key).or_default();
        for value in values {
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(Schema::string().tag(), SchemaTag::String);
        assert_eq!(Schema::string().optional().tag(), SchemaTag::Optional);
        assert_eq!(Schema::object().build().tag(), SchemaTag::Object);
        assert_eq!(Schema::string().transform(|v| v).tag(), SchemaTag::Pipe);
    }

    #[test]
    fn test_optionality_flags() {
        let s = Schema::string();
        assert!(!s.optin() && !s.optout());

        let opt = Schema::string().optional();
        assert!(opt.optin() && opt.optout());

        let def = Schema::string().default("x");
        assert!(def.optin() && !def.optout());

        let nullable_opt = Schema::string().optional().nullable();
        assert!(nullable_opt.optin() && nullable_opt.optout());

        let union = Schema::union([Schema::number(), Schema::undefined()]);
        assert!(union.optin() && union.optout());
    }

    #[test]
    fn test_values() {
        assert_eq!(
            Schema::enumeration(["a", "b"]).values(),
            Some(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(
            Schema::literal("a").optional().values(),
            Some(vec![Value::from("a"), Value::Undefined])
        );
        assert_eq!(
            Schema::literal("a").optional().non_optional().values(),
            Some(vec![Value::from("a")])
        );
        assert_eq!(Schema::string().values(), None);
    }

    #[test]
    fn test_builders_do_not_mutate_original() {
        let base = Schema::string();
        let checked = base.clone().check(Check::min_length(2));
        assert!(base.checks().is_empty());
        assert_eq!(checked.checks().len(), 1);
    }

    #[test]
    fn test_lazy_thunk_not_invoked_at_construction() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let lazy = Schema::lazy(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Schema::string()
        });
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        assert!(lazy.parse("a").is_ok());
        assert!(lazy.parse("b").is_ok());
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}

//! The check pipeline.
//!
//! Any schema may carry an ordered list of [`Check`]s that run after the
//! node's own parse. A check inspects the payload and may push issues; only
//! overwrite checks replace the value. Once the payload is aborted the
//! remaining checks are skipped, except checks with a `when` guard, which run
//! whenever their guard says so.
//!
//! # Example
//!
//! ```rust
//! use sieve::{Check, Schema};
//!
//! let username = Schema::string()
//!     .check(Check::min_length(3))
//!     .check(Check::regex(r"^[a-z0-9_]+$").unwrap());
//!
//! assert!(username.safe_parse("ada_99").unwrap().is_success());
//!
//! // Both failures are reported; neither is fatal.
//! let issues = username.safe_parse("A!").unwrap().into_result().unwrap_err();
//! assert_eq!(issues.len(), 2);
//! ```

use std::cmp::Ordering;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::ParseContext;
use crate::error::{EngineError, ErrorMap, Issue, IssueKind, Limit, Origin, SchemaBuildError};
use crate::path::JsonPath;
use crate::payload::{ParsePayload, RunResult, Step};
use crate::schema::Schema;
use crate::value::{Value, I128_LIMIT};

pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type AsyncPredicateFn = Arc<dyn Fn(Value) -> BoxFuture<'static, bool> + Send + Sync>;
pub type SuperRefineFn = Arc<dyn Fn(&Value, &mut RefinementCtx) + Send + Sync>;
pub type AsyncSuperRefineFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Vec<Issue>> + Send + Sync>;
pub type WhenFn = Arc<dyn Fn(&ParsePayload) -> bool + Send + Sync>;
pub type OverwriteFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Collects issues raised by refinements and transforms.
#[derive(Debug, Default)]
pub struct RefinementCtx {
    issues: Vec<Issue>,
}

impl RefinementCtx {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records an issue. [`Issue::custom`] builds the common case.
    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub(crate) fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

/// A user-supplied validation function.
#[derive(Clone)]
pub enum Refinement {
    Predicate(PredicateFn),
    AsyncPredicate(AsyncPredicateFn),
    Super(SuperRefineFn),
    AsyncSuper(AsyncSuperRefineFn),
}

/// String formats understood by [`Check::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringFormat {
    Email,
    Url,
    Uuid,
    Ipv4,
    Ipv6,
    Cuid,
    Ulid,
    Base64,
    IsoDate,
    IsoDateTime,
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-]+(?:\.[A-Za-z0-9_'+\-]+)*@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});
static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+\-.]*://[^\s/?#]+[^\s]*$").expect("url pattern is valid")
});
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-8][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}|00000000-0000-0000-0000-000000000000|ffffffff-ffff-ffff-ffff-ffffffffffff)$")
        .expect("uuid pattern is valid")
});
static CUID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[cC][^\s-]{8,}$").expect("cuid pattern is valid"));
static ULID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-HJKMNP-TV-Za-hjkmnp-tv-z]{26}$").expect("ulid pattern is valid")
});
static BASE64: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9a-zA-Z+/]{4})*(?:[0-9a-zA-Z+/]{2}==|[0-9a-zA-Z+/]{3}=)?$")
        .expect("base64 pattern is valid")
});

impl StringFormat {
    pub fn name(&self) -> &'static str {
        match self {
            StringFormat::Email => "email",
            StringFormat::Url => "url",
            StringFormat::Uuid => "uuid",
            StringFormat::Ipv4 => "ipv4",
            StringFormat::Ipv6 => "ipv6",
            StringFormat::Cuid => "cuid",
            StringFormat::Ulid => "ulid",
            StringFormat::Base64 => "base64",
            StringFormat::IsoDate => "date",
            StringFormat::IsoDateTime => "datetime",
        }
    }

    fn regex(&self) -> Option<&'static Regex> {
        match self {
            StringFormat::Email => Some(&EMAIL),
            StringFormat::Url => Some(&URL),
            StringFormat::Uuid => Some(&UUID),
            StringFormat::Cuid => Some(&CUID),
            StringFormat::Ulid => Some(&ULID),
            StringFormat::Base64 => Some(&BASE64),
            _ => None,
        }
    }

    pub fn matches(&self, s: &str) -> bool {
        match self {
            StringFormat::Ipv4 => s.parse::<Ipv4Addr>().is_ok(),
            StringFormat::Ipv6 => s.parse::<Ipv6Addr>().is_ok(),
            StringFormat::IsoDate => {
                s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            StringFormat::IsoDateTime => DateTime::parse_from_rfc3339(s).is_ok(),
            other => other.regex().map(|r| r.is_match(s)).unwrap_or(false),
        }
    }
}

#[derive(Clone)]
pub(crate) enum CheckKind {
    MinLength(usize),
    MaxLength(usize),
    Length(usize),
    MinSize(usize),
    MaxSize(usize),
    Size(usize),
    Greater { limit: Limit, inclusive: bool },
    Less { limit: Limit, inclusive: bool },
    MultipleOf(f64),
    Int,
    Regex(Regex),
    Format(StringFormat),
    StartsWith(String),
    EndsWith(String),
    Includes(String),
    Overwrite(OverwriteFn),
    Refine {
        refinement: Refinement,
        path: JsonPath,
        params: Option<serde_json::Value>,
    },
}

/// A post-parse check attached to a schema with [`Schema::check`].
#[derive(Clone)]
pub struct Check {
    pub(crate) kind: CheckKind,
    when: Option<WhenFn>,
    abort: bool,
    error: Option<ErrorMap>,
}

impl From<f64> for Limit {
    fn from(n: f64) -> Self {
        Limit::Number(n)
    }
}

impl From<i32> for Limit {
    fn from(n: i32) -> Self {
        Limit::Number(f64::from(n))
    }
}

impl From<i64> for Limit {
    fn from(n: i64) -> Self {
        Limit::Number(n as f64)
    }
}

impl From<i128> for Limit {
    fn from(n: i128) -> Self {
        Limit::BigInt(n)
    }
}

impl From<DateTime<Utc>> for Limit {
    fn from(d: DateTime<Utc>) -> Self {
        Limit::Date(d)
    }
}

impl Check {
    fn of(kind: CheckKind) -> Self {
        Self {
            kind,
            when: None,
            abort: false,
            error: None,
        }
    }

    pub fn min_length(min: usize) -> Self {
        Self::of(CheckKind::MinLength(min))
    }

    pub fn max_length(max: usize) -> Self {
        Self::of(CheckKind::MaxLength(max))
    }

    pub fn length(len: usize) -> Self {
        Self::of(CheckKind::Length(len))
    }

    pub fn min_size(min: usize) -> Self {
        Self::of(CheckKind::MinSize(min))
    }

    pub fn max_size(max: usize) -> Self {
        Self::of(CheckKind::MaxSize(max))
    }

    pub fn size(size: usize) -> Self {
        Self::of(CheckKind::Size(size))
    }

    pub fn gt(limit: impl Into<Limit>) -> Self {
        Self::of(CheckKind::Greater {
            limit: limit.into(),
            inclusive: false,
        })
    }

    pub fn gte(limit: impl Into<Limit>) -> Self {
        Self::of(CheckKind::Greater {
            limit: limit.into(),
            inclusive: true,
        })
    }

    pub fn lt(limit: impl Into<Limit>) -> Self {
        Self::of(CheckKind::Less {
            limit: limit.into(),
            inclusive: false,
        })
    }

    pub fn lte(limit: impl Into<Limit>) -> Self {
        Self::of(CheckKind::Less {
            limit: limit.into(),
            inclusive: true,
        })
    }

    pub fn multiple_of(divisor: f64) -> Self {
        Self::of(CheckKind::MultipleOf(divisor))
    }

    /// Requires a safe integer. A non-integer is a fatal `invalid_type`.
    pub fn int() -> Self {
        Self::of(CheckKind::Int)
    }

    pub fn regex(pattern: &str) -> Result<Self, SchemaBuildError> {
        Ok(Self::of(CheckKind::Regex(Regex::new(pattern)?)))
    }

    pub fn format(format: StringFormat) -> Self {
        Self::of(CheckKind::Format(format))
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self::of(CheckKind::StartsWith(prefix.into()))
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self::of(CheckKind::EndsWith(suffix.into()))
    }

    pub fn includes(needle: impl Into<String>) -> Self {
        Self::of(CheckKind::Includes(needle.into()))
    }

    /// Replaces the value. Never raises issues.
    pub fn overwrite<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::of(CheckKind::Overwrite(Arc::new(f)))
    }

    pub fn trim() -> Self {
        Self::overwrite(|v| match v {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        })
    }

    pub fn to_lower_case() -> Self {
        Self::overwrite(|v| match v {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        })
    }

    pub fn to_upper_case() -> Self {
        Self::overwrite(|v| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        })
    }

    fn refinement(refinement: Refinement) -> Self {
        Self::of(CheckKind::Refine {
            refinement,
            path: JsonPath::root(),
            params: None,
        })
    }

    /// Fails with a `custom` issue when `f` returns false.
    pub fn refine<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::refinement(Refinement::Predicate(Arc::new(f)))
    }

    /// Asynchronous [`refine`](Self::refine). Only usable from the async
    /// entry points.
    pub fn refine_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        Self::refinement(Refinement::AsyncPredicate(Arc::new(move |v| f(v).boxed())))
    }

    /// Lets `f` add any number of issues through the [`RefinementCtx`].
    pub fn super_refine<F>(f: F) -> Self
    where
        F: Fn(&Value, &mut RefinementCtx) + Send + Sync + 'static,
    {
        Self::refinement(Refinement::Super(Arc::new(f)))
    }

    pub fn super_refine_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Vec<Issue>> + Send + 'static,
    {
        Self::refinement(Refinement::AsyncSuper(Arc::new(move |v| f(v).boxed())))
    }

    /// Runs the check only when `f` returns true, even on an aborted payload.
    pub fn when<F>(mut self, f: F) -> Self
    where
        F: Fn(&ParsePayload) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(f));
        self
    }

    /// Makes this check's issues fatal.
    pub fn abort(mut self) -> Self {
        self.abort = true;
        self
    }

    /// Sets a fixed message for this check's issues.
    pub fn message(self, message: impl Into<String>) -> Self {
        self.error_map(ErrorMap::message(message))
    }

    pub fn error_map(mut self, map: ErrorMap) -> Self {
        self.error = Some(map);
        self
    }

    /// Sets the path of a refinement's issue, relative to the checked value.
    pub fn at_path(mut self, at: JsonPath) -> Self {
        if let CheckKind::Refine { path, .. } = &mut self.kind {
            *path = at;
        }
        self
    }

    /// Attaches JSON params to a refinement's issue.
    pub fn params(mut self, value: serde_json::Value) -> Self {
        if let CheckKind::Refine { params, .. } = &mut self.kind {
            *params = Some(value);
        }
        self
    }

    fn should_run(&self, payload: &ParsePayload, aborted: bool) -> bool {
        match &self.when {
            Some(when) => when(payload),
            None => !aborted,
        }
    }

    fn issue(&self, kind: IssueKind, input: &Value, node_error: Option<&ErrorMap>) -> Issue {
        Issue::new(kind)
            .with_input(input.clone())
            .fatal(self.abort)
            .with_error_map(self.error.as_ref().or(node_error))
    }

    /// Applies the check. Asynchronous refinements return the issues they will
    /// raise as a future; they are never started in a synchronous context.
    fn apply(
        &self,
        payload: &mut ParsePayload,
        node_error: Option<&ErrorMap>,
        ctx: &ParseContext,
    ) -> Result<Option<BoxFuture<'static, Vec<Issue>>>, EngineError> {
        let value = &payload.value;
        let issue = match &self.kind {
            CheckKind::MinLength(min) => length_issue(value, *min, Bound::Min),
            CheckKind::MaxLength(max) => length_issue(value, *max, Bound::Max),
            CheckKind::Length(len) => length_issue(value, *len, Bound::Exact),
            CheckKind::MinSize(min) => size_issue(value, *min, Bound::Min),
            CheckKind::MaxSize(max) => size_issue(value, *max, Bound::Max),
            CheckKind::Size(size) => size_issue(value, *size, Bound::Exact),
            CheckKind::Greater { limit, inclusive } => match compare(value, limit) {
                Ok(ordering) => ordering.and_then(|(ord, origin)| {
                    let ok = ord.is_gt() || (*inclusive && ord.is_eq());
                    (!ok).then(|| IssueKind::TooSmall {
                        origin,
                        minimum: limit.clone(),
                        inclusive: *inclusive,
                        exact: false,
                    })
                }),
                Err(expected) => {
                    let issue = Issue::invalid_type(expected, value)
                        .with_error_map(self.error.as_ref().or(node_error));
                    payload.push(issue);
                    return Ok(None);
                }
            },
            CheckKind::Less { limit, inclusive } => match compare(value, limit) {
                Ok(ordering) => ordering.and_then(|(ord, origin)| {
                    let ok = ord.is_lt() || (*inclusive && ord.is_eq());
                    (!ok).then(|| IssueKind::TooBig {
                        origin,
                        maximum: limit.clone(),
                        inclusive: *inclusive,
                        exact: false,
                    })
                }),
                Err(expected) => {
                    let issue = Issue::invalid_type(expected, value)
                        .with_error_map(self.error.as_ref().or(node_error));
                    payload.push(issue);
                    return Ok(None);
                }
            },
            CheckKind::MultipleOf(divisor) => {
                let ok = match value {
                    Value::Number(n) => is_multiple_of(*n, *divisor),
                    Value::BigInt(n) if divisor.fract() == 0.0 && divisor.abs() < I128_LIMIT => {
                        let d = *divisor as i128;
                        d != 0 && n % d == 0
                    }
                    // Fractional divisors: 5n is a multiple of 2.5.
                    Value::BigInt(n) => is_multiple_of(*n as f64, *divisor),
                    _ => true,
                };
                (!ok).then_some(IssueKind::NotMultipleOf { divisor: *divisor })
            }
            CheckKind::Int => {
                if let Value::Number(n) = value {
                    if n.fract() != 0.0 {
                        let issue = Issue::invalid_type("int", value)
                            .with_error_map(self.error.as_ref().or(node_error));
                        payload.push(issue);
                        return Ok(None);
                    }
                    if *n > MAX_SAFE_INTEGER {
                        Some(IssueKind::TooBig {
                            origin: Origin::Number,
                            maximum: Limit::Number(MAX_SAFE_INTEGER),
                            inclusive: true,
                            exact: false,
                        })
                    } else if *n < -MAX_SAFE_INTEGER {
                        Some(IssueKind::TooSmall {
                            origin: Origin::Number,
                            minimum: Limit::Number(-MAX_SAFE_INTEGER),
                            inclusive: true,
                            exact: false,
                        })
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            CheckKind::Regex(regex) => value.as_str().and_then(|s| {
                (!regex.is_match(s)).then(|| IssueKind::InvalidFormat {
                    format: "regex".to_string(),
                    pattern: Some(regex.as_str().to_string()),
                })
            }),
            CheckKind::Format(format) => value.as_str().and_then(|s| {
                (!format.matches(s)).then(|| IssueKind::InvalidFormat {
                    format: format.name().to_string(),
                    pattern: format.regex().map(|r| r.as_str().to_string()),
                })
            }),
            CheckKind::StartsWith(prefix) => value.as_str().and_then(|s| {
                (!s.starts_with(prefix.as_str())).then(|| IssueKind::InvalidFormat {
                    format: "starts_with".to_string(),
                    pattern: Some(prefix.clone()),
                })
            }),
            CheckKind::EndsWith(suffix) => value.as_str().and_then(|s| {
                (!s.ends_with(suffix.as_str())).then(|| IssueKind::InvalidFormat {
                    format: "ends_with".to_string(),
                    pattern: Some(suffix.clone()),
                })
            }),
            CheckKind::Includes(needle) => value.as_str().and_then(|s| {
                (!s.contains(needle.as_str())).then(|| IssueKind::InvalidFormat {
                    format: "includes".to_string(),
                    pattern: Some(needle.clone()),
                })
            }),
            CheckKind::Overwrite(f) => {
                let current = std::mem::take(&mut payload.value);
                payload.value = f(current);
                return Ok(None);
            }
            CheckKind::Refine {
                refinement,
                path,
                params,
            } => return self.apply_refinement(refinement, path, params, payload, node_error, ctx),
        };
        if let Some(kind) = issue {
            let issue = self.issue(kind, value, node_error);
            payload.push(issue);
        }
        Ok(None)
    }

    fn apply_refinement(
        &self,
        refinement: &Refinement,
        path: &JsonPath,
        params: &Option<serde_json::Value>,
        payload: &mut ParsePayload,
        node_error: Option<&ErrorMap>,
        ctx: &ParseContext,
    ) -> Result<Option<BoxFuture<'static, Vec<Issue>>>, EngineError> {
        let error_map = self.error.clone().or_else(|| node_error.cloned());
        let abort = self.abort;
        let failure = {
            let path = path.clone();
            let params = params.clone();
            let error_map = error_map.clone();
            move |input: Value| {
                Issue::new(IssueKind::Custom { params })
                    .with_path(path)
                    .with_input(input)
                    .fatal(abort)
                    .with_error_map(error_map.as_ref())
            }
        };
        let adopt = move |input: &Value, issues: Vec<Issue>| -> Vec<Issue> {
            issues
                .into_iter()
                .map(|mut issue| {
                    if issue.input.is_none() {
                        issue.input = Some(input.clone());
                    }
                    let fatal = issue.fatal || abort;
                    issue.fatal(fatal).with_error_map(error_map.as_ref())
                })
                .collect()
        };
        match refinement {
            Refinement::Predicate(f) => {
                if !f(&payload.value) {
                    let issue = failure(payload.value.clone());
                    payload.push(issue);
                }
                Ok(None)
            }
            Refinement::Super(f) => {
                let mut rctx = RefinementCtx::new();
                f(&payload.value, &mut rctx);
                let issues = adopt(&payload.value, rctx.into_issues());
                payload.issues.extend(issues);
                Ok(None)
            }
            Refinement::AsyncPredicate(f) => {
                ctx.ensure_async()?;
                let input = payload.value.clone();
                let fut = f(input.clone());
                Ok(Some(
                    async move {
                        if fut.await {
                            Vec::new()
                        } else {
                            vec![failure(input)]
                        }
                    }
                    .boxed(),
                ))
            }
            Refinement::AsyncSuper(f) => {
                ctx.ensure_async()?;
                let input = payload.value.clone();
                let fut = f(input.clone());
                Ok(Some(async move { adopt(&input, fut.await) }.boxed()))
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Min,
    Max,
    Exact,
}

fn bound_issue(actual: usize, limit: usize, bound: Bound, origin: Origin) -> Option<IssueKind> {
    let too_small = |exact| IssueKind::TooSmall {
        origin,
        minimum: Limit::Size(limit),
        inclusive: true,
        exact,
    };
    let too_big = |exact| IssueKind::TooBig {
        origin,
        maximum: Limit::Size(limit),
        inclusive: true,
        exact,
    };
    match bound {
        Bound::Min if actual < limit => Some(too_small(false)),
        Bound::Max if actual > limit => Some(too_big(false)),
        Bound::Exact if actual < limit => Some(too_small(true)),
        Bound::Exact if actual > limit => Some(too_big(true)),
        _ => None,
    }
}

fn length_issue(value: &Value, limit: usize, bound: Bound) -> Option<IssueKind> {
    let origin = match value {
        Value::String(_) => Origin::String,
        Value::Array(_) => Origin::Array,
        _ => return None,
    };
    bound_issue(value.length()?, limit, bound, origin)
}

fn size_issue(value: &Value, limit: usize, bound: Bound) -> Option<IssueKind> {
    let origin = match value {
        Value::Set(_) => Origin::Set,
        Value::Map(_) => Origin::Map,
        Value::File(_) => Origin::File,
        _ => return None,
    };
    bound_issue(value.size()?, limit, bound, origin)
}

/// Orders a value against a bound. Numbers and bigints compare across kinds.
/// A number, bigint or date against a bound it cannot be ordered with is
/// `Err` carrying the kind the bound expects; other values are skipped.
fn compare(value: &Value, limit: &Limit) -> Result<Option<(Ordering, Origin)>, &'static str> {
    let ordering = match (value, limit) {
        (Value::Number(n), Limit::Number(l)) => n.partial_cmp(l).map(|o| (o, Origin::Number)),
        (Value::Number(n), Limit::BigInt(l)) => cmp_float_int(*n, *l).map(|o| (o, Origin::Number)),
        (Value::BigInt(n), Limit::BigInt(l)) => Some((n.cmp(l), Origin::BigInt)),
        (Value::BigInt(n), Limit::Number(l)) => {
            cmp_float_int(*l, *n).map(|o| (o.reverse(), Origin::BigInt))
        }
        (Value::Date(d), Limit::Date(l)) => Some((d.cmp(l), Origin::Date)),
        (Value::Number(_) | Value::BigInt(_) | Value::Date(_), limit) => {
            return Err(match limit {
                Limit::Date(_) => "date",
                Limit::BigInt(_) => "bigint",
                Limit::Number(_) | Limit::Size(_) => "number",
            })
        }
        _ => None,
    };
    Ok(ordering)
}

/// Exact ordering of a float against an integer, without rounding the integer.
fn cmp_float_int(n: f64, l: i128) -> Option<Ordering> {
    if n.is_nan() {
        return None;
    }
    if n >= I128_LIMIT {
        return Some(Ordering::Greater);
    }
    if n < -I128_LIMIT {
        return Some(Ordering::Less);
    }
    let floor = n.floor();
    let fraction = if n > floor {
        Ordering::Greater
    } else {
        Ordering::Equal
    };
    Some((floor as i128).cmp(&l).then(fraction))
}

fn decimals(n: f64) -> i32 {
    let repr = n.to_string();
    match repr.split_once('.') {
        Some((_, frac)) => frac.len() as i32,
        None => 0,
    }
}

/// Decimal-aware remainder test, so `0.3` counts as a multiple of `0.1`.
fn is_multiple_of(value: f64, divisor: f64) -> bool {
    if divisor == 0.0 || !value.is_finite() {
        return false;
    }
    let scale = 10f64.powi(decimals(value).max(decimals(divisor)).min(15));
    let v = (value * scale).round();
    let d = (divisor * scale).round();
    d != 0.0 && (v % d) == 0.0
}

/// Runs `schema`'s checks over a payload its core parse produced.
pub(crate) fn run_checks(schema: &Schema, mut payload: ParsePayload, ctx: &ParseContext) -> RunResult {
    let checks = schema.checks();
    let node_error = schema.node_error();
    let mut aborted = payload.is_aborted();
    for (index, check) in checks.iter().enumerate() {
        if !check.should_run(&payload, aborted) {
            continue;
        }
        let before = payload.issues.len();
        match check.apply(&mut payload, node_error, ctx)? {
            None => {
                if !aborted {
                    aborted = payload.is_aborted_since(before);
                }
            }
            Some(pending) => {
                let schema = schema.clone();
                let ctx = ctx.clone();
                return ctx.clone().suspend(
                    async move {
                        payload.issues.extend(pending.await);
                        if !aborted {
                            aborted = payload.is_aborted_since(before);
                        }
                        finish_checks(schema, payload, index + 1, aborted, ctx).await
                    }
                    .boxed(),
                );
            }
        }
    }
    Ok(Step::Ready(payload))
}

/// Runs the checks after the first suspended one, in order.
async fn finish_checks(
    schema: Schema,
    mut payload: ParsePayload,
    start: usize,
    mut aborted: bool,
    ctx: ParseContext,
) -> Result<ParsePayload, EngineError> {
    for check in schema.checks().iter().skip(start) {
        if !check.should_run(&payload, aborted) {
            continue;
        }
        let before = payload.issues.len();
        if let Some(pending) = check.apply(&mut payload, schema.node_error(), &ctx)? {
            payload.issues.extend(pending.await);
        }
        if !aborted {
            aborted = payload.is_aborted_since(before);
        }
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(check: &Check, value: Value) -> ParsePayload {
        let ctx = ParseContext::new(&crate::ParseOptions::new(), false);
        let mut payload = ParsePayload::new(value);
        let pending = check.apply(&mut payload, None, &ctx).unwrap();
        assert!(pending.is_none());
        payload
    }

    #[test]
    fn test_length_checks_use_value_origin() {
        let payload = apply(&Check::min_length(3), Value::from("ab"));
        match &payload.issues[0].kind {
            IssueKind::TooSmall { origin, minimum, .. } => {
                assert_eq!(*origin, Origin::String);
                assert_eq!(*minimum, Limit::Size(3));
            }
            other => panic!("unexpected {:?}", other),
        }

        let payload = apply(&Check::max_length(1), Value::array([1, 2]));
        assert_eq!(payload.issues[0].code(), "too_big");

        let payload = apply(&Check::length(2), Value::from("abc"));
        assert!(matches!(
            payload.issues[0].kind,
            IssueKind::TooBig { exact: true, .. }
        ));
    }

    #[test]
    fn test_length_counts_characters() {
        let payload = apply(&Check::max_length(3), Value::from("日本語"));
        assert!(payload.issues.is_empty());
    }

    #[test]
    fn test_comparisons() {
        assert!(apply(&Check::gt(5), Value::from(5)).issues.len() == 1);
        assert!(apply(&Check::gte(5), Value::from(5)).issues.is_empty());
        assert!(apply(&Check::lt(5), Value::from(4.5)).issues.is_empty());
        assert!(apply(&Check::lte(5i128), Value::BigInt(6)).issues.len() == 1);
    }

    #[test]
    fn test_comparisons_across_numeric_kinds() {
        assert_eq!(apply(&Check::gte(0), Value::BigInt(-5)).issues[0].code(), "too_small");
        assert!(apply(&Check::gte(0), Value::BigInt(0)).issues.is_empty());
        assert!(apply(&Check::gt(1.5), Value::BigInt(2)).issues.is_empty());
        assert_eq!(apply(&Check::lt(10i128), Value::from(50)).issues[0].code(), "too_big");
        assert!(apply(&Check::lt(10i128), Value::from(9.5)).issues.is_empty());
        assert_eq!(apply(&Check::lte(10i128), Value::from(10.5)).issues.len(), 1);
        assert!(apply(&Check::gt(i128::MAX), Value::from(1e300)).issues.is_empty());
    }

    #[test]
    fn test_comparison_against_unusable_bound_is_reported() {
        use chrono::TimeZone;

        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let payload = apply(&Check::gt(cutoff), Value::from(3));
        assert_eq!(
            payload.issues[0].kind,
            IssueKind::InvalidType {
                expected: "date".to_string(),
                received: crate::value::ValueType::Number,
            }
        );
        assert!(payload.is_aborted());
        assert_eq!(apply(&Check::lt(5), Value::Date(cutoff)).issues.len(), 1);
        // Values outside the ordered kinds are left to other checks.
        assert!(apply(&Check::gt(5), Value::from("abc")).issues.is_empty());
    }

    #[test]
    fn test_multiple_of_is_decimal_aware() {
        assert!(apply(&Check::multiple_of(0.1), Value::from(0.3)).issues.is_empty());
        assert!(apply(&Check::multiple_of(5.0), Value::from(10)).issues.is_empty());
        assert_eq!(
            apply(&Check::multiple_of(5.0), Value::from(7)).issues[0].code(),
            "not_multiple_of"
        );
        assert!(apply(&Check::multiple_of(2.5), Value::BigInt(5)).issues.is_empty());
        assert_eq!(apply(&Check::multiple_of(2.5), Value::BigInt(6)).issues.len(), 1);
        assert!(apply(&Check::multiple_of(4.0), Value::BigInt(12)).issues.is_empty());
    }

    #[test]
    fn test_int_check_is_fatal_type_issue() {
        let payload = apply(&Check::int(), Value::from(1.5));
        assert_eq!(payload.issues[0].code(), "invalid_type");
        assert!(payload.issues[0].fatal);
        assert!(apply(&Check::int(), Value::from(3)).issues.is_empty());
    }

    #[test]
    fn test_string_formats() {
        assert!(StringFormat::Email.matches("ada@example.com"));
        assert!(!StringFormat::Email.matches("ada@@example"));
        assert!(StringFormat::Uuid.matches("123e4567-e89b-12d3-a456-426614174000"));
        assert!(StringFormat::Ipv4.matches("10.0.0.1"));
        assert!(!StringFormat::Ipv4.matches("10.0.0.256"));
        assert!(StringFormat::Ipv6.matches("::1"));
        assert!(StringFormat::Url.matches("https://example.com/a?b=c"));
        assert!(StringFormat::IsoDate.matches("2024-02-29"));
        assert!(!StringFormat::IsoDate.matches("2023-02-29"));
        assert!(StringFormat::IsoDateTime.matches("2024-01-01T10:00:00Z"));
    }

    #[test]
    fn test_format_issue_is_non_fatal() {
        let payload = apply(&Check::format(StringFormat::Email), Value::from("nope"));
        assert_eq!(payload.issues[0].code(), "invalid_format");
        assert!(!payload.issues[0].fatal);
    }

    #[test]
    fn test_abort_makes_issue_fatal() {
        let payload = apply(&Check::min_length(5).abort(), Value::from("a"));
        assert!(payload.issues[0].fatal);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let payload = apply(&Check::trim(), Value::from("  x "));
        assert_eq!(payload.value, Value::from("x"));
        assert!(payload.issues.is_empty());
    }

    #[test]
    fn test_refine_carries_path_and_params() {
        let check = Check::refine(|v| v.as_str() == Some("ok"))
            .at_path(JsonPath::from_field("confirm"))
            .params(serde_json::json!({"reason": "mismatch"}));
        let payload = apply(&check, Value::from("no"));
        let issue = &payload.issues[0];
        assert_eq!(issue.path.to_string(), "confirm");
        assert_eq!(
            issue.kind,
            IssueKind::Custom {
                params: Some(serde_json::json!({"reason": "mismatch"}))
            }
        );
        assert!(!issue.fatal);
    }

    #[test]
    fn test_super_refine_adds_many() {
        let check = Check::super_refine(|_, ctx| {
            ctx.add_issue(Issue::custom("one"));
            ctx.add_issue(Issue::custom("two"));
        });
        let payload = apply(&check, Value::Null);
        assert_eq!(payload.issues.len(), 2);
        assert_eq!(payload.issues[0].input, Some(Value::Null));
    }

    #[test]
    fn test_async_refinement_refused_in_sync_context() {
        let ctx = ParseContext::new(&crate::ParseOptions::new(), false);
        let check = Check::refine_async(|_| async { true });
        let mut payload = ParsePayload::new(Value::Null);
        let err = check.apply(&mut payload, None, &ctx).err();
        assert_eq!(err, Some(EngineError::AsyncInSync));
    }
}

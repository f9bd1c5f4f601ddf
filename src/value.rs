//! The dynamic value domain.
//!
//! Untrusted input arrives as a [`Value`] and successful parses produce one.
//! The domain is wider than JSON: it distinguishes `undefined` from `null`,
//! carries big integers, dates, symbols, maps, sets, files and deferred values,
//! so that every schema kind has something to accept or reject.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;

/// `2^127`: floats at or beyond this magnitude have no `i128` counterpart.
pub(crate) const I128_LIMIT: f64 = -(i128::MIN as f64);

/// An ordered string-keyed object.
pub type Object = IndexMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absence of a value. Distinct from a missing object key.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Date(DateTime<Utc>),
    Symbol(Symbol),
    Array(Vec<Value>),
    Object(Object),
    /// Insertion-ordered map with arbitrary keys.
    Map(Vec<(Value, Value)>),
    /// Insertion-ordered set.
    Set(Vec<Value>),
    File(FileValue),
    /// A value that becomes available later.
    Promise(DeferredValue),
}

/// The kind of a [`Value`], as reported in `invalid_type` issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Undefined,
    Null,
    Boolean,
    Number,
    NaN,
    Infinity,
    BigInt,
    String,
    Date,
    Symbol,
    Array,
    Object,
    Map,
    Set,
    File,
    Promise,
}

impl ValueType {
    /// Returns the lowercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Undefined => "undefined",
            ValueType::Null => "null",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::NaN => "NaN",
            ValueType::Infinity => "Infinity",
            ValueType::BigInt => "bigint",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Symbol => "symbol",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Map => "map",
            ValueType::Set => "set",
            ValueType::File => "file",
            ValueType::Promise => "promise",
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Builds an object value from key/value pairs, preserving order.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds an array value.
    pub fn array<V: Into<Value>, I: IntoIterator<Item = V>>(items: I) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Builds a map value from key/value pairs.
    pub fn map<K: Into<Value>, V: Into<Value>, I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a set value, dropping duplicates.
    pub fn set<V: Into<Value>, I: IntoIterator<Item = V>>(items: I) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            let item = item.into();
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::Set(out)
    }

    /// Wraps a future as a deferred value.
    pub fn promise<F>(future: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        Value::Promise(DeferredValue::new(future))
    }

    /// Returns the kind of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Undefined => ValueType::Undefined,
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(n) if n.is_nan() => ValueType::NaN,
            Value::Number(n) if n.is_infinite() => ValueType::Infinity,
            Value::Number(_) => ValueType::Number,
            Value::BigInt(_) => ValueType::BigInt,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Symbol(_) => ValueType::Symbol,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
            Value::Map(_) => ValueType::Map,
            Value::Set(_) => ValueType::Set,
            Value::File(_) => ValueType::File,
            Value::Promise(_) => ValueType::Promise,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up an object key. Returns `None` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Character length of strings, element count of arrays.
    pub(crate) fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Entry count of sets and maps, byte count of files.
    pub(crate) fn size(&self) -> Option<usize> {
        match self {
            Value::Set(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            Value::File(file) => Some(file.size()),
            _ => None,
        }
    }

    /// Converts the JSON-representable subset back into `serde_json`.
    ///
    /// Dates become RFC 3339 strings, big integers that fit in `i64` become
    /// numbers; `undefined` object entries are skipped. Anything else returns
    /// `None`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    Json::from(*n as i64)
                } else {
                    Json::Number(serde_json::Number::from_f64(*n)?)
                }
            }
            Value::BigInt(n) => Json::from(i64::try_from(*n).ok()?),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.to_rfc3339()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|v| v.to_json())
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    if v.is_undefined() {
                        continue;
                    }
                    out.insert(k.clone(), v.to_json()?);
                }
                Json::Object(out)
            }
            _ => return None,
        })
    }

    /// JavaScript `String(value)` conversion.
    pub(crate) fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::BigInt(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339(),
            Value::Symbol(sym) => format!("Symbol({})", sym.description()),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Map(_) => "[object Map]".to_string(),
            Value::Set(_) => "[object Set]".to_string(),
            Value::File(_) => "[object File]".to_string(),
            Value::Promise(_) => "[object Promise]".to_string(),
        }
    }

    /// JavaScript `Number(value)` conversion.
    pub(crate) fn to_js_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::BigInt(n) => *n as f64,
            Value::String(s) => parse_js_number(s),
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => Value::String(single.to_js_string()).to_js_number(),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// JavaScript truthiness.
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// JavaScript `BigInt(value)` conversion; `None` where JavaScript throws.
    pub(crate) fn to_js_bigint(&self) -> Option<i128> {
        match self {
            Value::BigInt(n) => Some(*n),
            Value::Bool(b) => Some(i128::from(*b)),
            Value::Number(n) if n.fract() == 0.0 && (-I128_LIMIT..I128_LIMIT).contains(n) => {
                Some(*n as i128)
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0)
                } else {
                    trimmed.parse().ok()
                }
            }
            _ => None,
        }
    }

    /// JavaScript `new Date(value)` conversion; `None` for an invalid date.
    pub(crate) fn to_js_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Number(n) if n.is_finite() => Utc.timestamp_millis_opt(*n as i64).single(),
            Value::String(s) => parse_date(s.trim()),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let name = if n > 0.0 { "Infinity" } else { "-Infinity" };
        name.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // Exponent form, with an explicit sign on the exponent.
        let repr = format!("{:e}", n);
        match repr.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => repr,
        }
    } else {
        n.to_string()
    }
}

fn parse_js_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if let Some(hex) = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
            {
                return i64::from_str_radix(hex, 16)
                    .map(|n| n as f64)
                    .unwrap_or(f64::NAN);
            }
            // Rust accepts "inf"/"nan" spellings that JavaScript rejects.
            if trimmed
                .chars()
                .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
            {
                return f64::NAN;
            }
            trimmed.parse().unwrap_or(f64::NAN)
        }
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            other => f.write_str(&other.to_js_string()),
        }
    }
}

/// A unique symbol. Two symbols are equal only if they are the same symbol.
#[derive(Clone)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Symbol(Arc::from(description.into()))
    }

    pub fn description(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// An uploaded file: a name, a MIME type and its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FileValue {
    pub name: String,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl FileValue {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: Arc::from(data.into()),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A value produced by a future, shared between every clone.
#[derive(Clone)]
pub struct DeferredValue(Shared<BoxFuture<'static, Value>>);

impl DeferredValue {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        DeferredValue(future.boxed().shared())
    }

    /// A deferred value that is already available.
    pub fn ready(value: Value) -> Self {
        Self::new(async move { value })
    }

    /// Waits for the value.
    pub async fn resolve(&self) -> Value {
        self.0.clone().await
    }
}

impl PartialEq for DeferredValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredValue(..)")
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f32, i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInt(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Value::Symbol(sym)
    }
}

impl From<FileValue> for Value {
    fn from(file: FileValue) -> Self {
        Value::File(file)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Undefined)
    }
}

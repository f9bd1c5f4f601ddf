//! Record, map and set nodes.

use crate::context::ParseContext;
use crate::error::{Issue, IssueKind, Origin};
use crate::path::{JsonPath, PathSegment};
use crate::payload::{self, ParsePayload, RunResult, Step};
use crate::value::{Object, Value};

use super::Schema;

fn reject(schema: &Schema, expected: &str, mut payload: ParsePayload, value: Value) -> RunResult {
    let issue = Issue::invalid_type(expected, &value).with_error_map(schema.node_error());
    payload.value = value;
    payload.push(issue);
    Ok(Step::Ready(payload))
}

pub(super) fn parse_record(
    schema: &Schema,
    key_schema: &Schema,
    value_schema: &Schema,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = match std::mem::take(&mut payload.value) {
        Value::Object(input) => input,
        other => return reject(schema, "record", payload, other),
    };
    match key_schema.values() {
        Some(keys) => parse_exhaustive_record(schema, keys, value_schema, payload, input, ctx),
        None => parse_open_record(schema, key_schema, value_schema, payload, input, ctx),
    }
}

/// Every enumerated key is validated; keys outside the enumeration are
/// rejected.
fn parse_exhaustive_record(
    schema: &Schema,
    keys: Vec<Value>,
    value_schema: &Schema,
    mut payload: ParsePayload,
    input: Object,
    ctx: &ParseContext,
) -> RunResult {
    let keys: Vec<String> = keys
        .iter()
        .filter(|k| matches!(k, Value::String(_) | Value::Number(_)))
        .map(Value::to_js_string)
        .collect();
    let mut entries = Vec::new();
    let mut steps = Vec::new();
    for key in &keys {
        let value = input.get(key).cloned();
        if value.is_none() && value_schema.optin() {
            continue;
        }
        entries.push((key.clone(), value.is_some()));
        steps.push(value_schema.run(ParsePayload::new(value.unwrap_or_default()), ctx)?);
    }
    let unrecognized: Vec<String> = input
        .keys()
        .filter(|k| !keys.contains(k))
        .cloned()
        .collect();

    let error_map = schema.node_error().cloned();
    payload::join(steps).then(move |children| {
        let mut output = Object::new();
        for ((key, present), child) in entries.into_iter().zip(children) {
            let value = payload.absorb(child, Some(PathSegment::Field(key.clone())));
            if !value.is_undefined() || present {
                output.insert(key, value);
            }
        }
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

fn parse_open_record(
    schema: &Schema,
    key_schema: &Schema,
    value_schema: &Schema,
    mut payload: ParsePayload,
    input: Object,
    ctx: &ParseContext,
) -> RunResult {
    let mut keys = Vec::with_capacity(input.len());
    let mut steps = Vec::with_capacity(input.len() * 2);
    for (key, value) in input {
        steps.push(key_schema.run(ParsePayload::new(Value::String(key.clone())), ctx)?);
        steps.push(value_schema.run(ParsePayload::new(value), ctx)?);
        keys.push(key);
    }

    let error_map = schema.node_error().cloned();
    payload::join(steps).then(move |children| {
        let mut output = Object::new();
        let mut children = children.into_iter();
        for key in keys {
            let (Some(key_result), Some(value_result)) = (children.next(), children.next()) else {
                break;
            };
            if !key_result.issues.is_empty() {
                let issue = Issue::new(IssueKind::InvalidKey {
                    origin: Origin::Record,
                    issues: key_result.issues,
                })
                .with_path(JsonPath::from_field(key.clone()))
                .with_input(Value::String(key))
                .with_error_map(error_map.as_ref());
                payload.push(issue);
                continue;
            }
            let out_key = match key_result.value {
                Value::String(s) => s,
                other => other.to_js_string(),
            };
            let value = payload.absorb(value_result, Some(PathSegment::Field(key)));
            output.insert(out_key, value);
        }
        payload.value = Value::Object(output);
        Ok(Step::Ready(payload))
    })
}

/// String and number keys can appear in a path; other keys cannot.
fn key_segment(key: &Value) -> Option<PathSegment> {
    match key {
        Value::String(s) => Some(PathSegment::Field(s.clone())),
        Value::Number(_) => Some(PathSegment::Field(key.to_js_string())),
        _ => None,
    }
}

pub(super) fn parse_map(
    schema: &Schema,
    key_schema: &Schema,
    value_schema: &Schema,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = match std::mem::take(&mut payload.value) {
        Value::Map(input) => input,
        other => return reject(schema, "map", payload, other),
    };
    let mut keys = Vec::with_capacity(input.len());
    let mut steps = Vec::with_capacity(input.len() * 2);
    for (key, value) in input {
        steps.push(key_schema.run(ParsePayload::new(key.clone()), ctx)?);
        steps.push(value_schema.run(ParsePayload::new(value), ctx)?);
        keys.push(key);
    }

    let error_map = schema.node_error().cloned();
    payload::join(steps).then(move |children| {
        let mut output = Vec::with_capacity(keys.len());
        let mut children = children.into_iter();
        for key in keys {
            let (Some(key_result), Some(value_result)) = (children.next(), children.next()) else {
                break;
            };
            let segment = key_segment(&key);
            let out_key = match (&segment, key_result.issues.is_empty()) {
                (Some(seg), false) => payload.absorb(key_result, Some(seg.clone())),
                (None, false) => {
                    let issue = Issue::new(IssueKind::InvalidKey {
                        origin: Origin::Map,
                        issues: key_result.issues,
                    })
                    .with_input(key.clone())
                    .with_error_map(error_map.as_ref());
                    payload.push(issue);
                    key_result.value
                }
                (_, true) => key_result.value,
            };
            let out_value = match (segment, value_result.issues.is_empty()) {
                (Some(seg), false) => payload.absorb(value_result, Some(seg)),
                (None, false) => {
                    let issue = Issue::new(IssueKind::InvalidElement {
                        origin: Origin::Map,
                        key: key.clone(),
                        issues: value_result.issues,
                    })
                    .with_input(key)
                    .with_error_map(error_map.as_ref());
                    payload.push(issue);
                    value_result.value
                }
                (_, true) => value_result.value,
            };
            output.push((out_key, out_value));
        }
        payload.value = Value::Map(output);
        Ok(Step::Ready(payload))
    })
}

pub(super) fn parse_set(
    schema: &Schema,
    element: &Schema,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = match std::mem::take(&mut payload.value) {
        Value::Set(input) => input,
        other => return reject(schema, "set", payload, other),
    };
    let steps = input
        .into_iter()
        .map(|item| element.run(ParsePayload::new(item), ctx))
        .collect::<Result<Vec<_>, _>>()?;

    payload::join(steps).then(move |children| {
        let values: Vec<Value> = children
            .into_iter()
            .map(|child| payload.absorb(child, None))
            .collect();
        payload.value = Value::set(values);
        Ok(Step::Ready(payload))
    })
}

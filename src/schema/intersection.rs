//! Intersection: both sides must accept the input, and their outputs are
//! deep-merged.

use crate::context::ParseContext;
use crate::error::EngineError;
use crate::path::{JsonPath, PathSegment};
use crate::payload::{self, ParsePayload, RunResult, Step};
use crate::value::{Object, Value};

use super::Schema;

pub(super) fn parse_intersection(
    left: &Schema,
    right: &Schema,
    payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let steps = vec![
        left.run(ParsePayload::new(payload.value.clone()), ctx)?,
        right.run(ParsePayload::new(payload.value.clone()), ctx)?,
    ];
    payload::join(steps).then(move |results| {
        let mut payload = payload;
        let mut results = results.into_iter();
        let (Some(a), Some(b)) = (results.next(), results.next()) else {
            return Ok(Step::Ready(payload));
        };
        payload.issues.extend(a.issues);
        payload.issues.extend(b.issues);
        if payload.is_aborted() {
            return Ok(Step::Ready(payload));
        }
        match merge_values(a.value, b.value) {
            Ok(merged) => {
                payload.value = merged;
                Ok(Step::Ready(payload))
            }
            Err(path) => {
                tracing::debug!(path = %path, "intersection outputs cannot be merged");
                Err(EngineError::UnmergeableIntersection { path })
            }
        }
    })
}

/// Deep-merges two outputs. Equal values merge to themselves; objects merge
/// key by key; arrays of equal length merge element-wise. Anything else fails
/// with the path of the conflict.
pub(crate) fn merge_values(a: Value, b: Value) -> Result<Value, JsonPath> {
    if a == b {
        return Ok(a);
    }
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => merge_objects(a, b).map(Value::Object),
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            let mut merged = Vec::with_capacity(a.len());
            for (index, (x, y)) in a.into_iter().zip(b).enumerate() {
                let value = merge_values(x, y).map_err(|p| p.prepend(PathSegment::Index(index)))?;
                merged.push(value);
            }
            Ok(Value::Array(merged))
        }
        _ => Err(JsonPath::root()),
    }
}

fn merge_objects(a: Object, mut b: Object) -> Result<Object, JsonPath> {
    let mut merged = Object::with_capacity(a.len() + b.len());
    for (key, x) in a {
        let value = match b.shift_remove(&key) {
            Some(y) => merge_values(x, y).map_err(|p| p.prepend(PathSegment::Field(key.clone())))?,
            None => x,
        };
        merged.insert(key, value);
    }
    merged.extend(b);
    Ok(merged)
}

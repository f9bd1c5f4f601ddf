//! Array and tuple validation.
//!
//! Every element is validated even after a failure; element issues are
//! prefixed with their index.

use crate::context::ParseContext;
use crate::error::{Issue, IssueKind, Limit, Origin};
use crate::path::PathSegment;
use crate::payload::{self, ParsePayload, RunResult, Step};
use crate::value::Value;

use super::Schema;

pub(super) fn parse_array(
    schema: &Schema,
    element: &Schema,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let items = match std::mem::take(&mut payload.value) {
        Value::Array(items) => items,
        other => {
            let issue = Issue::invalid_type("array", &other).with_error_map(schema.node_error());
            payload.value = other;
            payload.push(issue);
            return Ok(Step::Ready(payload));
        }
    };

    let steps = items
        .into_iter()
        .map(|item| element.run(ParsePayload::new(item), ctx))
        .collect::<Result<Vec<_>, _>>()?;

    payload::join(steps).then(move |children| {
        let mut output = Vec::with_capacity(children.len());
        for (index, child) in children.into_iter().enumerate() {
            output.push(payload.absorb(child, Some(PathSegment::Index(index))));
        }
        payload.value = Value::Array(output);
        Ok(Step::Ready(payload))
    })
}

/// Number of leading items that must be present: everything up to and
/// including the last item that does not accept `undefined`.
fn required_len(items: &[Schema]) -> usize {
    items
        .iter()
        .rposition(|item| !item.optin())
        .map_or(0, |index| index + 1)
}

pub(super) fn parse_tuple(
    schema: &Schema,
    items: &[Schema],
    rest: Option<&Schema>,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = match std::mem::take(&mut payload.value) {
        Value::Array(input) => input,
        other => {
            let issue = Issue::invalid_type("tuple", &other).with_error_map(schema.node_error());
            payload.value = other;
            payload.push(issue);
            return Ok(Step::Ready(payload));
        }
    };

    let required = required_len(items);
    if rest.is_none() {
        let arity = if input.len() > items.len() {
            Some(IssueKind::TooBig {
                origin: Origin::Array,
                maximum: Limit::Size(items.len()),
                inclusive: true,
                exact: false,
            })
        } else if input.len() < required {
            Some(IssueKind::TooSmall {
                origin: Origin::Array,
                minimum: Limit::Size(required),
                inclusive: true,
                exact: false,
            })
        } else {
            None
        };
        if let Some(kind) = arity {
            let issue = Issue::new(kind)
                .with_input(Value::Array(input.clone()))
                .with_error_map(schema.node_error());
            payload.value = Value::Array(input);
            payload.push(issue);
            return Ok(Step::Ready(payload));
        }
    }

    let mut indices = Vec::new();
    let mut steps = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if index >= input.len() && index >= required {
            continue;
        }
        let value = input.get(index).cloned().unwrap_or_default();
        indices.push(index);
        steps.push(item.run(ParsePayload::new(value), ctx)?);
    }
    if let Some(rest) = rest {
        for (index, value) in input.iter().enumerate().skip(items.len()) {
            indices.push(index);
            steps.push(rest.run(ParsePayload::new(value.clone()), ctx)?);
        }
    }

    payload::join(steps).then(move |children| {
        let mut output = Vec::with_capacity(children.len());
        for (index, child) in indices.into_iter().zip(children) {
            output.push(payload.absorb(child, Some(PathSegment::Index(index))));
        }
        payload.value = Value::Array(output);
        Ok(Step::Ready(payload))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Check;
    use serde_json::json;

    #[test]
    fn test_array_collects_every_element_issue() {
        let schema = Schema::array(Schema::string());
        let errors = schema
            .safe_parse(json!(["a", 1, "b", false]))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        let paths: Vec<_> = errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["[1]", "[3]"]);
    }

    #[test]
    fn test_array_non_array_input() {
        let errors = Schema::array(Schema::string())
            .safe_parse("nope")
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(
            errors.first().message(),
            "Invalid input: expected array, received string"
        );
    }

    #[test]
    fn test_array_length_checks() {
        let schema = Schema::array(Schema::number()).check(Check::min_length(2));
        assert!(schema.parse(json!([1, 2])).is_ok());
        let errors = schema
            .safe_parse(json!([1]))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(
            errors.first().message(),
            "Too small: expected array to have >=2 items"
        );
    }

    #[test]
    fn test_tuple_arity() {
        let schema = Schema::tuple([Schema::string(), Schema::number()]);

        let errors = schema
            .safe_parse(json!(["a"]))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().code(), "too_small");

        let errors = schema
            .safe_parse(json!(["a", 1, 2]))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().code(), "too_big");

        assert_eq!(
            schema.parse(json!(["a", 1])).unwrap(),
            Value::from(json!(["a", 1]))
        );
    }

    #[test]
    fn test_tuple_trailing_optional_items() {
        let schema = Schema::tuple([Schema::string(), Schema::number().optional()]);
        assert_eq!(schema.parse(json!(["a"])).unwrap(), Value::from(json!(["a"])));
        assert!(schema.parse(json!([])).is_err());
    }

    #[test]
    fn test_tuple_rest() {
        let schema = Schema::tuple_with_rest([Schema::string()], Schema::number());
        assert!(schema.parse(json!(["a", 1, 2, 3])).is_ok());
        let errors = schema
            .safe_parse(json!(["a", 1, "x"]))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.first().path.to_string(), "[2]");
    }
}

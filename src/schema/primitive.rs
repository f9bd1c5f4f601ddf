//! Leaf nodes: primitives, `any`/`unknown`/`never`, and the type guard of
//! `custom`.
//!
//! A leaf checks membership in its domain, optionally coercing the input
//! first, and pushes a single fatal `invalid_type` issue on failure.

use crate::error::Issue;
use crate::payload::ParsePayload;
use crate::value::Value;

use super::{Schema, SchemaDef};

pub(super) fn parse(schema: &Schema, mut payload: ParsePayload) -> ParsePayload {
    let expected = match schema.def() {
        SchemaDef::String { coerce } => {
            if *coerce {
                payload.value = Value::String(payload.value.to_js_string());
            }
            matches!(payload.value, Value::String(_)).then_some(()).ok_or("string")
        }
        SchemaDef::Number { coerce } => {
            if *coerce {
                payload.value = Value::Number(payload.value.to_js_number());
            }
            matches!(payload.value, Value::Number(n) if n.is_finite())
                .then_some(())
                .ok_or("number")
        }
        SchemaDef::Boolean { coerce } => {
            if *coerce {
                payload.value = Value::Bool(payload.value.is_truthy());
            }
            matches!(payload.value, Value::Bool(_)).then_some(()).ok_or("boolean")
        }
        SchemaDef::BigInt { coerce } => {
            if *coerce {
                if let Some(n) = payload.value.to_js_bigint() {
                    payload.value = Value::BigInt(n);
                }
            }
            matches!(payload.value, Value::BigInt(_)).then_some(()).ok_or("bigint")
        }
        SchemaDef::Date { coerce } => {
            if *coerce {
                if let Some(date) = payload.value.to_js_date() {
                    payload.value = Value::Date(date);
                }
            }
            matches!(payload.value, Value::Date(_)).then_some(()).ok_or("date")
        }
        SchemaDef::Never => Err("never"),
        SchemaDef::Void => payload.value.is_undefined().then_some(()).ok_or("void"),
        SchemaDef::Undefined => payload.value.is_undefined().then_some(()).ok_or("undefined"),
        SchemaDef::Null => payload.value.is_null().then_some(()).ok_or("null"),
        SchemaDef::Symbol => matches!(payload.value, Value::Symbol(_))
            .then_some(())
            .ok_or("symbol"),
        SchemaDef::File => matches!(payload.value, Value::File(_)).then_some(()).ok_or("file"),
        _ => Ok(()),
    };
    if let Err(expected) = expected {
        let issue =
            Issue::invalid_type(expected, &payload.value).with_error_map(schema.node_error());
        payload.push(issue);
    }
    payload
}

#[cfg(test)]
mod tests {
    use crate::schema::Schema;
    use crate::value::{FileValue, Symbol, Value};
    use serde_json::json;

    #[test]
    fn test_primitives_accept_their_domain() {
        assert!(Schema::string().parse("x").is_ok());
        assert!(Schema::number().parse(1.5).is_ok());
        assert!(Schema::boolean().parse(false).is_ok());
        assert!(Schema::bigint().parse(Value::BigInt(10)).is_ok());
        assert!(Schema::null().parse(Value::Null).is_ok());
        assert!(Schema::undefined().parse(Value::Undefined).is_ok());
        assert!(Schema::void().parse(Value::Undefined).is_ok());
        assert!(Schema::symbol().parse(Symbol::new("s")).is_ok());
        assert!(Schema::file()
            .parse(FileValue::new("a.txt", "text/plain", b"hi".to_vec()))
            .is_ok());
        assert!(Schema::any().parse(json!({"a": 1})).is_ok());
        assert!(Schema::unknown().parse(Value::Undefined).is_ok());
    }

    #[test]
    fn test_type_mismatch_is_single_fatal_issue() {
        let issues = Schema::string()
            .safe_parse(5)
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues.first().code(), "invalid_type");
        assert!(issues.first().fatal);
        assert_eq!(
            issues.first().message(),
            "Invalid input: expected string, received number"
        );
    }

    #[test]
    fn test_number_rejects_nan_and_infinity() {
        let err = Schema::number().parse(f64::NAN).unwrap_err();
        assert!(err.to_string().contains("received NaN"));
        assert!(Schema::number().parse(f64::INFINITY).is_err());
    }

    #[test]
    fn test_never_rejects_everything() {
        assert!(Schema::never().parse(Value::Undefined).is_err());
        assert!(Schema::never().parse(1).is_err());
    }

    #[test]
    fn test_coercion() {
        assert_eq!(Schema::string().coerce().parse(12).unwrap(), Value::from("12"));
        assert_eq!(Schema::number().coerce().parse("3.5").unwrap(), Value::from(3.5));
        assert!(Schema::number().coerce().parse("abc").is_err());
        assert_eq!(Schema::boolean().coerce().parse("").unwrap(), Value::Bool(false));
        assert_eq!(Schema::boolean().coerce().parse("no").unwrap(), Value::Bool(true));
        assert_eq!(
            Schema::bigint().coerce().parse("42").unwrap(),
            Value::BigInt(42)
        );
        assert!(Schema::date().coerce().parse("2024-01-01T00:00:00Z").is_ok());
    }

    #[test]
    fn test_accepted_values_pass_through_unchanged() {
        let input = Value::from(json!({"nested": [1, "two", null]}));
        assert_eq!(Schema::any().parse(input.clone()).unwrap(), input);
    }
}

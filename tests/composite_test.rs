//! Integration tests for composite schemas: objects, unions, discriminated
//! unions, tuples, intersections and records.

use serde_json::json;
use sieve::{Check, EngineError, IssueKind, JsonPath, ParseOptions, Schema, Value};

/// Helper to extract the success value from a Validation
fn unwrap_success<T, E: std::fmt::Debug>(v: stillwater::Validation<T, E>) -> T {
    v.into_result().unwrap()
}

/// Helper to extract the error value from a Validation
fn unwrap_failure<T, E>(v: stillwater::Validation<T, E>) -> E
where
    T: std::fmt::Debug,
{
    v.into_result().unwrap_err()
}

#[test]
fn test_passthrough_nodes_are_idempotent() {
    let schema = Schema::object()
        .field("id", Schema::number())
        .field("tags", Schema::array(Schema::string()))
        .field("pair", Schema::tuple([Schema::boolean(), Schema::null()]))
        .field("meta", Schema::record(Schema::string(), Schema::unknown()))
        .field("kind", Schema::enumeration(["a", "b"]))
        .optional("note", Schema::string().nullable())
        .build();

    let input = Value::from(json!({
        "id": 1,
        "tags": ["x", "y"],
        "pair": [true, null],
        "meta": {"nested": {"deep": [1, 2]}},
        "kind": "b",
        "note": null
    }));
    let once = unwrap_success(schema.safe_parse(input.clone()).unwrap());
    assert_eq!(once, input);
    assert_eq!(unwrap_success(schema.safe_parse(once.clone()).unwrap()), once);
}

#[test]
fn test_union_first_valid_wins() {
    let schema = Schema::union([
        Schema::number().transform(|_| Value::from("A")),
        Schema::number().transform(|_| Value::from("B")),
    ]);
    assert_eq!(schema.parse(1).unwrap(), Value::from("A"));
}

#[test]
fn test_union_dirty_result_short_circuits() {
    let dirty = Schema::object()
        .field("n", Schema::number().check(Check::gt(10)))
        .build();
    let invalid = Schema::object().field("s", Schema::string()).build();
    let schema = Schema::union([dirty, invalid]);

    let errors = unwrap_failure(schema.safe_parse(json!({"n": 1})).unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().code(), "too_small");
    assert_eq!(errors.first().path, JsonPath::from_field("n"));
}

#[test]
fn test_union_later_valid_beats_earlier_dirty() {
    let schema = Schema::union([
        Schema::string().check(Check::min_length(10)),
        Schema::string(),
    ]);
    assert_eq!(schema.parse("short").unwrap(), Value::from("short"));
}

#[test]
fn test_object_optional_key_omission() {
    let schema = Schema::object().optional("a", Schema::string()).build();

    let out = unwrap_success(schema.safe_parse(json!({})).unwrap());
    assert_eq!(out.as_object().unwrap().len(), 0);

    let out = unwrap_success(
        schema
            .safe_parse(Value::object([("a", Value::Undefined)]))
            .unwrap(),
    );
    assert_eq!(out.get("a"), Some(&Value::Undefined));

    let errors = unwrap_failure(schema.safe_parse(json!({"a": 5})).unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().code(), "invalid_type");
    assert_eq!(errors.first().path, JsonPath::from_field("a"));
}

#[test]
fn test_object_results_identical_with_and_without_plan() {
    let schema = Schema::object()
        .field("a", Schema::string())
        .optional("b", Schema::number())
        .default("c", Schema::boolean(), false)
        .field("d", Schema::string().optional().non_optional())
        .strict()
        .build();
    let inputs = vec![
        json!({}),
        json!({"a": "x", "d": "y"}),
        json!({"a": 1, "b": "2", "c": "3", "d": null, "e": 4}),
        json!([1, 2]),
    ];
    for input in inputs {
        let planned = schema
            .safe_parse_with(input.clone(), &ParseOptions::new().jitless(false))
            .unwrap()
            .into_result();
        let interpreted = schema
            .safe_parse_with(input, &ParseOptions::new().jitless(true))
            .unwrap()
            .into_result();
        assert_eq!(planned, interpreted);
    }
}

#[test]
fn test_discriminated_union_dispatches_on_key() {
    let schema = Schema::discriminated_union("kind")
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
        .unwrap();

    // The "x" option would accept this value; only "y" is consulted.
    let errors = unwrap_failure(schema.safe_parse(json!({"kind": "y", "value": 1})).unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().path, JsonPath::from_field("value"));

    let errors = unwrap_failure(schema.safe_parse(json!({"kind": "z"})).unwrap());
    match &errors.first().kind {
        IssueKind::InvalidUnion {
            errors,
            note,
            discriminator,
        } => {
            assert!(errors.is_empty());
            assert_eq!(note.as_deref(), Some("No matching discriminator"));
            assert_eq!(discriminator.as_deref(), Some("kind"));
        }
        other => panic!("unexpected {:?}", other),
    }

    let errors = unwrap_failure(schema.safe_parse("nope").unwrap());
    assert_eq!(errors.first().code(), "invalid_type");
}

#[test]
fn test_tuple_arity() {
    let schema = Schema::tuple([Schema::string(), Schema::number()]);
    assert_eq!(
        unwrap_failure(schema.safe_parse(json!(["a"])).unwrap()).first().code(),
        "too_small"
    );
    assert_eq!(
        unwrap_failure(schema.safe_parse(json!(["a", 1, 2])).unwrap()).first().code(),
        "too_big"
    );
    assert!(schema.safe_parse(json!(["a", 1])).unwrap().is_success());
}

#[test]
fn test_intersection_merge() {
    let left = Schema::object().field("a", Schema::string()).build();
    let right = Schema::object().field("b", Schema::number()).build();
    assert_eq!(
        left.and(right).parse(json!({"a": "x", "b": 1})).unwrap(),
        Value::from(json!({"a": "x", "b": 1}))
    );
}

#[test]
fn test_intersection_conflict_is_reported_by_failing_side() {
    let foo = Schema::object().field("a", Schema::literal("foo")).build();
    let bar = Schema::object().field("a", Schema::literal("bar")).build();
    let errors = unwrap_failure(
        Schema::intersection(foo, bar)
            .safe_parse(json!({"a": "foo"}))
            .unwrap(),
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().code(), "invalid_value");
    assert_eq!(errors.first().path, JsonPath::from_field("a"));
}

#[test]
fn test_intersection_unmergeable_outputs() {
    let left = Schema::object()
        .field("a", Schema::string().transform(|_| Value::from(1)))
        .build();
    let right = Schema::object()
        .field("a", Schema::string().transform(|_| Value::from(2)))
        .build();
    assert_eq!(
        Schema::intersection(left, right)
            .safe_parse(json!({"a": "x"}))
            .unwrap_err(),
        EngineError::UnmergeableIntersection {
            path: JsonPath::from_field("a")
        }
    );
}

#[test]
fn test_record_over_enum_keys() {
    let schema = Schema::record(Schema::enumeration(["dev", "prod"]), Schema::string());
    assert!(schema
        .safe_parse(json!({"dev": "a", "prod": "b"}))
        .unwrap()
        .is_success());

    let errors = unwrap_failure(schema.safe_parse(json!({"dev": "a", "test": "c"})).unwrap());
    let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
    assert_eq!(codes, vec!["invalid_type", "unrecognized_keys"]);
}

#[test]
fn test_map_and_set() {
    let map = Schema::map(Schema::string(), Schema::number());
    let input = Value::map([("a", 1), ("b", 2)]);
    assert_eq!(map.parse(input.clone()).unwrap(), input);
    assert!(map.parse(json!({"a": 1})).is_err());

    let set = Schema::set(Schema::number()).check(Check::min_size(2));
    assert!(set.parse(Value::set([1, 2])).is_ok());
    assert!(set.parse(Value::set([1, 1])).is_err());
}

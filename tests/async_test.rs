//! Integration tests for the synchronous/asynchronous execution boundary.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use sieve::{Check, EngineError, Issue, JsonPath, Schema, Value};

/// Helper to extract the error value from a Validation
fn unwrap_failure<T, E>(v: stillwater::Validation<T, E>) -> E
where
    T: std::fmt::Debug,
{
    v.into_result().unwrap_err()
}

fn slow_refinement(delay_ms: u64, accept: bool) -> Check {
    Check::refine_async(move |_| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        accept
    })
}

#[test]
fn test_sync_parse_refuses_async_refinement() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let schema = Schema::object()
        .field("name", Schema::string())
        .field(
            "email",
            Schema::string().check(Check::refine_async(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { true }
            })),
        )
        .build();

    let result = schema.safe_parse(json!({"name": "a", "email": "b"}));
    assert_eq!(result.unwrap_err(), EngineError::AsyncInSync);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sync_parse_skips_async_check_on_aborted_value() {
    let schema = Schema::string().check(Check::refine_async(|_| async { true }));
    // The type guard aborts first, so the async check is never reached.
    let errors = unwrap_failure(schema.safe_parse(1).unwrap());
    assert_eq!(errors.first().code(), "invalid_type");
}

#[tokio::test]
async fn test_async_refinement() {
    let schema = Schema::string().check(
        Check::refine_async(|v| async move { v.as_str() != Some("taken") })
            .message("Username is taken"),
    );
    assert!(schema.safe_parse_async("free").await.unwrap().is_success());

    let errors = unwrap_failure(schema.safe_parse_async("taken").await.unwrap());
    assert_eq!(errors.first().message(), "Username is taken");
}

#[tokio::test]
async fn test_async_super_refine() {
    let schema = Schema::object()
        .field("start", Schema::number())
        .field("end", Schema::number())
        .build()
        .check(Check::super_refine_async(|v| async move {
            let start = v.get("start").and_then(Value::as_f64);
            let end = v.get("end").and_then(Value::as_f64);
            if start > end {
                vec![Issue::custom("end must follow start").with_path(JsonPath::from_field("end"))]
            } else {
                Vec::new()
            }
        }));

    let errors = unwrap_failure(
        schema
            .safe_parse_async(json!({"start": 5, "end": 1}))
            .await
            .unwrap(),
    );
    assert_eq!(errors.first().path.to_string(), "end");
}

#[tokio::test]
async fn test_object_issues_keep_declaration_order() {
    let schema = Schema::object()
        .field("slow", Schema::string().check(slow_refinement(30, false)))
        .field("fast", Schema::string().check(slow_refinement(1, false)))
        .field("sync", Schema::number())
        .build();

    let errors = unwrap_failure(
        schema
            .safe_parse_async(json!({"slow": "a", "fast": "b", "sync": "c"}))
            .await
            .unwrap(),
    );
    let paths: Vec<_> = errors.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(paths, vec!["slow", "fast", "sync"]);
}

#[tokio::test]
async fn test_union_picks_by_declaration_order_not_settle_order() {
    let schema = Schema::union([
        Schema::string()
            .check(slow_refinement(30, true))
            .transform(|_| Value::from("slow")),
        Schema::string().transform(|_| Value::from("fast")),
    ]);
    assert_eq!(schema.parse_async("x").await.unwrap(), Value::from("slow"));

    let dirty_first = Schema::union([
        Schema::string().check(slow_refinement(30, false)),
        Schema::string().check(slow_refinement(1, true)),
    ]);
    // The second option is fully valid, so it wins over the dirty first one.
    assert!(dirty_first.safe_parse_async("x").await.unwrap().is_success());
}

#[tokio::test]
async fn test_children_start_before_any_await() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let entry = |name: &'static str| {
        let log = log.clone();
        Check::refine_async(move |_| {
            log.lock().unwrap().push(format!("start {}", name));
            let log = log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.lock().unwrap().push(format!("end {}", name));
                true
            }
        })
    };
    let schema = Schema::array(Schema::string().check(entry("item")));
    assert!(schema.parse_async(json!(["a", "b"])).await.is_ok());

    let log = log.lock().unwrap();
    assert_eq!(&log[..2], &["start item", "start item"]);
}

#[tokio::test]
async fn test_checks_after_suspension_run_in_order() {
    let schema = Schema::string()
        .check(slow_refinement(5, true))
        .check(Check::min_length(3))
        .check(Check::to_upper_case());
    assert_eq!(schema.parse_async("abc").await.unwrap(), Value::from("ABC"));

    let errors = unwrap_failure(schema.safe_parse_async("ab").await.unwrap());
    assert_eq!(errors.first().code(), "too_small");
}

#[tokio::test]
async fn test_async_transform_in_pipe() {
    let schema = Schema::string()
        .transform_async(|v| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Value::from(v.as_str().map_or(0, str::len) as f64)
        })
        .pipe(Schema::number().check(Check::gte(2)));

    assert_eq!(schema.parse_async("abc").await.unwrap(), Value::from(3));
    let errors = unwrap_failure(schema.safe_parse_async("a").await.unwrap());
    assert_eq!(errors.first().code(), "too_small");
    assert_eq!(schema.safe_parse("abc").unwrap_err(), EngineError::AsyncInSync);
}

//! Wrapper nodes: optional, nullable, default, prefault, non-optional,
//! catch, success and promise.

use futures_util::future::FutureExt;

use crate::context::ParseContext;
use crate::error::Issue;
use crate::payload::{ParsePayload, RunResult, Step};
use crate::value::Value;

use super::{CatchValue, DefaultValue, Schema};

/// What a [`Schema::catch_with`] fallback sees: the issues being discarded
/// (with messages resolved) and the original input.
#[derive(Debug, Clone)]
pub struct CatchContext {
    pub issues: Vec<Issue>,
    pub input: Value,
}

pub(super) fn parse_optional(inner: &Schema, payload: ParsePayload, ctx: &ParseContext) -> RunResult {
    if !inner.optin() && payload.value.is_undefined() {
        return Ok(Step::Ready(payload));
    }
    inner.run(payload, ctx)
}

pub(super) fn parse_nullable(inner: &Schema, payload: ParsePayload, ctx: &ParseContext) -> RunResult {
    if payload.value.is_null() {
        return Ok(Step::Ready(payload));
    }
    inner.run(payload, ctx)
}

pub(super) fn parse_default(
    inner: &Schema,
    default: &DefaultValue,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    if payload.value.is_undefined() {
        payload.value = default.get();
        return Ok(Step::Ready(payload));
    }
    let default = default.clone();
    Ok(inner.run(payload, ctx)?.map(move |mut payload| {
        if payload.value.is_undefined() {
            payload.value = default.get();
        }
        payload
    }))
}

pub(super) fn parse_prefault(
    inner: &Schema,
    prefault: &DefaultValue,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    if payload.value.is_undefined() {
        payload.value = prefault.get();
    }
    inner.run(payload, ctx)
}

pub(super) fn parse_non_optional(
    schema: &Schema,
    inner: &Schema,
    payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let before = payload.issues.len();
    let error_map = schema.node_error().cloned();
    Ok(inner.run(payload, ctx)?.map(move |mut payload| {
        if payload.issues.len() == before && payload.value.is_undefined() {
            let issue = Issue::invalid_type("nonoptional", &payload.value)
                .with_error_map(error_map.as_ref());
            payload.push(issue);
        }
        payload
    }))
}

pub(super) fn parse_catch(
    inner: &Schema,
    fallback: &CatchValue,
    payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let child = inner.run(ParsePayload::new(payload.value.clone()), ctx)?;
    let fallback = fallback.clone();
    let ctx = ctx.clone();
    Ok(child.map(move |result| {
        let mut payload = payload;
        if result.issues.is_empty() {
            payload.value = result.value;
            return payload;
        }
        payload.value = match fallback {
            CatchValue::Fixed(value) => value,
            CatchValue::Computed(f) => {
                let catch = CatchContext {
                    issues: result.issues.into_iter().map(|i| ctx.finalize(i)).collect(),
                    input: std::mem::take(&mut payload.value),
                };
                tracing::trace!(issues = catch.issues.len(), "catch fallback invoked");
                f(&catch)
            }
        };
        payload
    }))
}

pub(super) fn parse_success(inner: &Schema, payload: ParsePayload, ctx: &ParseContext) -> RunResult {
    let child = inner.run(ParsePayload::new(payload.value.clone()), ctx)?;
    Ok(child.map(move |result| {
        let mut payload = payload;
        payload.value = Value::Bool(result.issues.is_empty());
        payload
    }))
}

pub(super) fn parse_promise(
    inner: &Schema,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = std::mem::take(&mut payload.value);
    let inner = inner.clone();
    let child_ctx = ctx.clone();
    ctx.suspend(
        async move {
            let resolved = match input {
                Value::Promise(deferred) => deferred.resolve().await,
                other => other,
            };
            let result = inner
                .run(ParsePayload::new(resolved), &child_ctx)?
                .into_future()
                .await?;
            payload.value = payload.absorb(result, None);
            Ok(payload)
        }
        .boxed(),
    )
}

//! Transform, pipe and lazy nodes.

use futures_util::future::FutureExt;

use crate::check::RefinementCtx;
use crate::context::ParseContext;
use crate::payload::{ParsePayload, RunResult, Step};

use super::{LazySource, Schema, Transform};

pub(super) fn parse_transform(
    schema: &Schema,
    transform: &Transform,
    mut payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let input = std::mem::take(&mut payload.value);
    match transform {
        Transform::Sync(f) => {
            let mut refinement = RefinementCtx::new();
            payload.value = f(input, &mut refinement);
            for issue in refinement.into_issues() {
                payload.push(issue.with_error_map(schema.node_error()));
            }
            Ok(Step::Ready(payload))
        }
        Transform::Async(f) => {
            ctx.ensure_async()?;
            let pending = f(input);
            ctx.suspend(
                async move {
                    payload.value = pending.await;
                    Ok(payload)
                }
                .boxed(),
            )
        }
    }
}

pub(super) fn parse_pipe(
    first: &Schema,
    second: &Schema,
    payload: ParsePayload,
    ctx: &ParseContext,
) -> RunResult {
    let step = first.run(payload, ctx)?;
    match step {
        Step::Ready(payload) if payload.is_aborted() => Ok(Step::Ready(payload)),
        Step::Ready(payload) => second.run(payload, ctx),
        pending => {
            let second = second.clone();
            let ctx = ctx.clone();
            pending.then(move |payload| {
                if payload.is_aborted() {
                    return Ok(Step::Ready(payload));
                }
                second.run(payload, &ctx)
            })
        }
    }
}

pub(super) fn parse_lazy(source: &LazySource, payload: ParsePayload, ctx: &ParseContext) -> RunResult {
    let target = source.resolve()?;
    let ctx = ctx.descend()?;
    target.run(payload, &ctx)
}

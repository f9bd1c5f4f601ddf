//! Parse context.
//!
//! A [`ParseContext`] is created once per top-level parse and passed by
//! reference through every recursive call. It carries whether suspension is
//! allowed, the error maps used to finalize issues, and lazy-depth tracking.

use futures_util::future::BoxFuture;

use crate::config::{self, ParseOptions};
use crate::error::{default_message, EngineError, ErrorMap, Issue};
use crate::payload::{ParsePayload, RunResult, Step};

#[derive(Debug, Clone)]
pub struct ParseContext {
    async_mode: bool,
    error_map: Option<ErrorMap>,
    global_error: Option<ErrorMap>,
    report_input: bool,
    jitless: bool,
    depth: usize,
    max_depth: usize,
}

impl ParseContext {
    /// Creates a context from per-call options over a snapshot of the global
    /// configuration.
    pub fn new(options: &ParseOptions, async_mode: bool) -> Self {
        let global = config::global();
        Self {
            async_mode,
            error_map: options.error.clone(),
            global_error: global.custom_error,
            report_input: options.report_input,
            jitless: options.jitless.unwrap_or(global.jitless),
            depth: 0,
            max_depth: options.max_depth.unwrap_or(global.max_depth),
        }
    }

    pub fn jitless(&self) -> bool {
        self.jitless
    }

    /// Fails unless this parse may suspend. Called before any asynchronous
    /// user function is invoked.
    pub(crate) fn ensure_async(&self) -> Result<(), EngineError> {
        if self.async_mode {
            Ok(())
        } else {
            tracing::warn!("asynchronous step reached during synchronous parse");
            Err(EngineError::AsyncInSync)
        }
    }

    /// Wraps a future as a pending step.
    pub(crate) fn suspend(
        &self,
        future: BoxFuture<'static, Result<ParsePayload, EngineError>>,
    ) -> RunResult {
        self.ensure_async()?;
        Ok(Step::Pending(future))
    }

    /// Returns a context one lazy level deeper.
    pub(crate) fn descend(&self) -> Result<Self, EngineError> {
        if self.depth >= self.max_depth {
            return Err(EngineError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }

    /// Resolves the message of `issue` (and of any nested issue lists) and
    /// strips its input unless input reporting is on.
    pub fn finalize(&self, mut issue: Issue) -> Issue {
        for nested in issue.kind.nested_mut() {
            let taken = std::mem::take(nested);
            *nested = taken.into_iter().map(|i| self.finalize(i)).collect();
        }
        if issue.message.is_none() {
            let default = default_message(&issue);
            let message = issue
                .error_map
                .as_ref()
                .and_then(|m| m.resolve(&issue, &default))
                .or_else(|| self.error_map.as_ref().and_then(|m| m.resolve(&issue, &default)))
                .or_else(|| {
                    self.global_error
                        .as_ref()
                        .and_then(|m| m.resolve(&issue, &default))
                })
                .unwrap_or(default);
            issue.message = Some(message);
        }
        if !self.report_input {
            issue.input = None;
        }
        issue.error_map = None;
        issue
    }
}

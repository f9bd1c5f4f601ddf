//! Entry points.
//!
//! Four variants: {throwing, non-throwing} × {sync, async}. The non-throwing
//! variants return a stillwater `Validation` wrapped in a `Result` whose error
//! side is reserved for [`EngineError`]s. The throwing variants fold both into
//! a [`ParseError`].

use rayon::prelude::*;
use stillwater::Validation;

use crate::config::ParseOptions;
use crate::context::ParseContext;
use crate::error::{EngineError, Issues, ParseError};
use crate::payload::{ParsePayload, Step};
use crate::schema::Schema;
use crate::value::Value;

/// Result of the `safe_parse*` entry points.
pub type SafeParseResult = Result<Validation<Value, Issues>, EngineError>;

impl Schema {
    /// Parses `input`, failing with every issue found.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sieve::{Check, ParseError, Schema};
    ///
    /// let schema = Schema::string().check(Check::min_length(3));
    /// assert!(schema.parse("abc").is_ok());
    ///
    /// match schema.parse("ab") {
    ///     Err(ParseError::Invalid(issues)) => assert_eq!(issues.first().code(), "too_small"),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn parse(&self, input: impl Into<Value>) -> Result<Value, ParseError> {
        self.parse_with(input, &ParseOptions::default())
    }

    pub fn parse_with(
        &self,
        input: impl Into<Value>,
        options: &ParseOptions,
    ) -> Result<Value, ParseError> {
        Ok(self.safe_parse_with(input, options)?.into_result()?)
    }

    /// Parses `input` without suspending.
    ///
    /// Returns `Err(EngineError::AsyncInSync)` if the schema reaches an
    /// asynchronous check, transform or promise. No asynchronous user
    /// function is invoked in that case.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sieve::{Check, EngineError, Schema};
    ///
    /// let result = Schema::number().safe_parse(42).unwrap();
    /// assert!(result.is_success());
    ///
    /// let slow = Schema::string().check(Check::refine_async(|_| async { true }));
    /// assert_eq!(slow.safe_parse("x").unwrap_err(), EngineError::AsyncInSync);
    /// ```
    pub fn safe_parse(&self, input: impl Into<Value>) -> SafeParseResult {
        self.safe_parse_with(input, &ParseOptions::default())
    }

    pub fn safe_parse_with(&self, input: impl Into<Value>, options: &ParseOptions) -> SafeParseResult {
        let ctx = ParseContext::new(options, false);
        match self.run(ParsePayload::new(input.into()), &ctx)? {
            Step::Ready(payload) => Ok(finish(payload, &ctx)),
            Step::Pending(_) => Err(EngineError::AsyncInSync),
        }
    }

    pub async fn parse_async(&self, input: impl Into<Value>) -> Result<Value, ParseError> {
        self.parse_async_with(input, &ParseOptions::default()).await
    }

    pub async fn parse_async_with(
        &self,
        input: impl Into<Value>,
        options: &ParseOptions,
    ) -> Result<Value, ParseError> {
        Ok(self.safe_parse_async_with(input, options).await?.into_result()?)
    }

    /// Parses `input`, awaiting any asynchronous work. Children of a
    /// composite run their synchronous parts first, then outstanding work is
    /// awaited together; results keep declaration order.
    pub async fn safe_parse_async(&self, input: impl Into<Value>) -> SafeParseResult {
        self.safe_parse_async_with(input, &ParseOptions::default())
            .await
    }

    pub async fn safe_parse_async_with(
        &self,
        input: impl Into<Value>,
        options: &ParseOptions,
    ) -> SafeParseResult {
        let ctx = ParseContext::new(options, true);
        let payload = self
            .run(ParsePayload::new(input.into()), &ctx)?
            .into_future()
            .await?;
        Ok(finish(payload, &ctx))
    }

    /// Synchronously parses many inputs in parallel. Results are in input
    /// order.
    ///
    /// ```rust
    /// use sieve::{Schema, Value};
    ///
    /// let inputs = vec![Value::from(1), Value::from("x"), Value::from(3)];
    /// let results = Schema::number().safe_parse_batch(&inputs);
    ///
    /// let ok: Vec<bool> = results.iter().map(|r| r.as_ref().unwrap().is_success()).collect();
    /// assert_eq!(ok, vec![true, false, true]);
    /// ```
    pub fn safe_parse_batch(&self, inputs: &[Value]) -> Vec<SafeParseResult> {
        self.safe_parse_batch_with(inputs, &ParseOptions::default())
    }

    pub fn safe_parse_batch_with(
        &self,
        inputs: &[Value],
        options: &ParseOptions,
    ) -> Vec<SafeParseResult> {
        tracing::debug!(inputs = inputs.len(), "parsing batch");
        inputs
            .par_iter()
            .map(|input| self.safe_parse_with(input.clone(), options))
            .collect()
    }
}

/// Resolves messages and converts the final payload into a `Validation`.
fn finish(payload: ParsePayload, ctx: &ParseContext) -> Validation<Value, Issues> {
    let issues = payload
        .issues
        .into_iter()
        .map(|issue| ctx.finalize(issue))
        .collect();
    match Issues::from_vec(issues) {
        None => Validation::Success(payload.value),
        Some(issues) => {
            tracing::debug!(
                issues = issues.len(),
                first = %issues.first(),
                "parse failed"
            );
            Validation::Failure(issues)
        }
    }
}

//! The value and issue carrier threaded through a parse.
//!
//! Every node receives a [`ParsePayload`], may rewrite its value and push
//! issues, and hands it back as a [`Step`]: either ready, or pending behind a
//! future when asynchronous work was involved. Composite nodes give each child
//! a fresh payload and fold the child's issues back with a path prefix.

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::error::{EngineError, Issue};
use crate::path::PathSegment;
use crate::value::Value;

/// Outcome of a (sub-)parse. Ordered: `Valid < Dirty < Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// No issues.
    Valid,
    /// Only non-fatal issues; the value has the right shape.
    Dirty,
    /// At least one fatal issue.
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsePayload {
    pub value: Value,
    pub issues: Vec<Issue>,
}

impl ParsePayload {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            issues: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        if self.is_aborted() {
            Status::Aborted
        } else if self.issues.is_empty() {
            Status::Valid
        } else {
            Status::Dirty
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.is_aborted_since(0)
    }

    /// True if any issue at or after `start` is fatal.
    pub fn is_aborted_since(&self, start: usize) -> bool {
        self.issues.iter().skip(start).any(|i| i.fatal)
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Appends a child's issues under `segment` and returns the child's value.
    pub(crate) fn absorb(&mut self, child: ParsePayload, segment: Option<PathSegment>) -> Value {
        match segment {
            Some(seg) => self
                .issues
                .extend(child.issues.into_iter().map(|i| i.prefixed(seg.clone()))),
            None => self.issues.extend(child.issues),
        }
        child.value
    }
}

pub(crate) type PendingPayload = BoxFuture<'static, Result<ParsePayload, EngineError>>;

/// The result of running one node.
pub(crate) enum Step {
    Ready(ParsePayload),
    Pending(PendingPayload),
}

pub(crate) type RunResult = Result<Step, EngineError>;

impl Step {
    pub(crate) fn into_future(self) -> PendingPayload {
        match self {
            Step::Ready(payload) => future::ready(Ok(payload)).boxed(),
            Step::Pending(fut) => fut,
        }
    }

    /// Continues with `f` once the payload is available.
    ///
    /// A ready step calls `f` immediately; a pending one defers it into the
    /// future. Only a pending step (which an async context created) can yield
    /// a pending result here.
    pub(crate) fn then<F>(self, f: F) -> RunResult
    where
        F: FnOnce(ParsePayload) -> RunResult + Send + 'static,
    {
        match self {
            Step::Ready(payload) => f(payload),
            Step::Pending(fut) => Ok(Step::Pending(
                async move {
                    let payload = fut.await?;
                    f(payload)?.into_future().await
                }
                .boxed(),
            )),
        }
    }

    /// Like [`then`](Self::then) for post-processing that cannot suspend.
    pub(crate) fn map<F>(self, f: F) -> Step
    where
        F: FnOnce(ParsePayload) -> ParsePayload + Send + 'static,
    {
        match self {
            Step::Ready(payload) => Step::Ready(f(payload)),
            Step::Pending(fut) => Step::Pending(fut.map(|r| r.map(f)).boxed()),
        }
    }
}

/// Child steps collected in declaration order.
pub(crate) enum Joined {
    Ready(Vec<ParsePayload>),
    Pending(BoxFuture<'static, Result<Vec<ParsePayload>, EngineError>>),
}

/// Waits for every child, keeping declaration order regardless of which
/// future settles first.
pub(crate) fn join(steps: Vec<Step>) -> Joined {
    if steps.iter().all(|s| matches!(s, Step::Ready(_))) {
        let ready = steps
            .into_iter()
            .filter_map(|s| match s {
                Step::Ready(payload) => Some(payload),
                Step::Pending(_) => None,
            })
            .collect();
        return Joined::Ready(ready);
    }
    let futures: Vec<_> = steps.into_iter().map(Step::into_future).collect();
    Joined::Pending(future::try_join_all(futures).boxed())
}

impl Joined {
    pub(crate) fn then<F>(self, f: F) -> RunResult
    where
        F: FnOnce(Vec<ParsePayload>) -> RunResult + Send + 'static,
    {
        match self {
            Joined::Ready(payloads) => f(payloads),
            Joined::Pending(fut) => Ok(Step::Pending(
                async move {
                    let payloads = fut.await?;
                    f(payloads)?.into_future().await
                }
                .boxed(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::JsonPath;

    #[test]
    fn test_status_lattice() {
        let mut payload = ParsePayload::new(Value::Null);
        assert_eq!(payload.status(), Status::Valid);

        payload.push(Issue::custom("soft"));
        assert_eq!(payload.status(), Status::Dirty);

        payload.push(Issue::invalid_type("string", &Value::Null));
        assert_eq!(payload.status(), Status::Aborted);

        payload.push(Issue::custom("soft again"));
        assert_eq!(payload.status(), Status::Aborted);
        assert!(Status::Valid < Status::Dirty && Status::Dirty < Status::Aborted);
    }

    #[test]
    fn test_aborted_since() {
        let mut payload = ParsePayload::new(Value::Null);
        payload.push(Issue::invalid_type("string", &Value::Null));
        payload.push(Issue::custom("soft"));
        assert!(payload.is_aborted_since(0));
        assert!(!payload.is_aborted_since(1));
    }

    #[test]
    fn test_absorb_prefixes_child_issues() {
        let mut parent = ParsePayload::new(Value::Undefined);
        let mut child = ParsePayload::new(Value::from("v"));
        child.push(Issue::custom("bad").with_path(JsonPath::from_field("inner")));

        let value = parent.absorb(child, Some(PathSegment::from("outer")));
        assert_eq!(value, Value::from("v"));
        assert_eq!(parent.issues[0].path.to_string(), "outer.inner");
    }

    #[test]
    fn test_join_ready_keeps_order() {
        let steps = vec![
            Step::Ready(ParsePayload::new(Value::from(1))),
            Step::Ready(ParsePayload::new(Value::from(2))),
        ];
        match join(steps) {
            Joined::Ready(payloads) => {
                assert_eq!(payloads[0].value, Value::from(1));
                assert_eq!(payloads[1].value, Value::from(2));
            }
            Joined::Pending(_) => panic!("expected ready"),
        }
    }

    #[tokio::test]
    async fn test_join_pending_keeps_declaration_order() {
        let slow = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(ParsePayload::new(Value::from("slow")))
        }
        .boxed();
        let steps = vec![
            Step::Pending(slow),
            Step::Ready(ParsePayload::new(Value::from("fast"))),
        ];
        let result = join(steps)
            .then(|payloads| {
                let values = payloads.into_iter().map(|p| p.value).collect::<Vec<_>>();
                Ok(Step::Ready(ParsePayload::new(Value::Array(values))))
            })
            .unwrap()
            .into_future()
            .await
            .unwrap();
        assert_eq!(result.value, Value::array(["slow", "fast"]));
    }
}

//! Sequential middleware execution.
//!
//! The chain is a plain loop over the applicable middleware, root-first.
//! Each step races its middleware against a fresh timer and reports one of
//! three tagged results; the loop either merges and moves on, returns the
//! short-circuit response, or fails. The handler runs only when every step
//! proceeded.
//!
//! Timeouts are best-effort: on expiry the middleware future is dropped,
//! which stops it at its next `.await`. Work it already spawned elsewhere
//! keeps running.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Outcome};
use crate::response::Response;

use super::{Control, MiddlewareDescriptor};

/// How one step ended.
#[derive(Debug)]
enum Step {
    Proceed(Option<Value>),
    ShortCircuit(Response),
    TimedOut,
}

/// One chain run: the applicable middleware, the terminal handler and the
/// per-step budget.
pub(crate) struct Chain<'r> {
    steps:   Vec<&'r MiddlewareDescriptor>,
    handler: &'r BoxedHandler,
    timeout: Duration,
}

impl<'r> Chain<'r> {
    pub(crate) fn new(
        steps: Vec<&'r MiddlewareDescriptor>,
        handler: &'r BoxedHandler,
        timeout: Duration,
    ) -> Self {
        Self { steps, handler, timeout }
    }

    pub(crate) async fn run(self, mut ctx: RequestContext) -> Outcome {
        for middleware in &self.steps {
            let (next_ctx, step) = self.step(middleware, ctx).await?;
            ctx = next_ctx;

            match step {
                Step::Proceed(data) => {
                    debug!(anchor = middleware.anchor(), "middleware proceeded");
                    if let Some(data) = data {
                        ctx.merge_custom(data);
                    }
                }
                Step::ShortCircuit(res) => {
                    debug!(anchor = middleware.anchor(), status = %res.status_code(), "middleware responded");
                    return Ok(Some(res));
                }
                Step::TimedOut => {
                    warn!(anchor = middleware.anchor(), timeout = ?self.timeout, "middleware timed out");
                    return Err(Error::MiddlewareTimeout {
                        anchor:  middleware.anchor().to_owned(),
                        timeout: self.timeout,
                    });
                }
            }
        }

        self.handler.call(ctx).await
    }

    /// Runs one middleware under its own timer and hands the context back.
    async fn step(
        &self,
        middleware: &MiddlewareDescriptor,
        ctx: RequestContext,
    ) -> Result<(RequestContext, Step)> {
        let shared = Arc::new(ctx);
        let settled = tokio::time::timeout(self.timeout, middleware.call(Arc::clone(&shared))).await;

        // Cloned only if the middleware kept its reference alive.
        let ctx = Arc::unwrap_or_clone(shared);

        let step = match settled {
            Err(_elapsed)                   => Step::TimedOut,
            Ok(Err(err))                    => return Err(err),
            Ok(Ok(Control::Respond(res)))   => Step::ShortCircuit(res),
            Ok(Ok(Control::Next(data)))     => Step::Proceed(data),
        };
        Ok((ctx, step))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{HeaderMap, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::handler::Handler;
    use crate::method::Method;
    use crate::middleware::{Middleware, Next};

    fn ctx() -> RequestContext {
        RequestContext::new(Method::Get, "/a/b", HeaderMap::new())
    }

    fn descriptor(anchor: &str, mw: impl Middleware) -> MiddlewareDescriptor {
        MiddlewareDescriptor::new(anchor.to_owned(), mw.into_boxed_middleware())
    }

    /// Logs its anchor, then proceeds with the number of data-bag keys it saw.
    fn recording(anchor: &'static str, log: Arc<Mutex<Vec<String>>>) -> MiddlewareDescriptor {
        descriptor(anchor, move |ctx: Arc<RequestContext>, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(anchor.to_owned());
                let seen = ctx.custom().len();
                next.with(json!({ "steps": { anchor: seen } }))
            }
        })
    }

    fn counting_handler(calls: Arc<AtomicUsize>) -> BoxedHandler {
        (move |ctx: RequestContext| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Response::json(Value::Object(ctx.custom().clone()))
            }
        })
        .into_boxed_handler()
    }

    #[tokio::test]
    async fn all_steps_proceed_then_handler_runs_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = [
            recording("", Arc::clone(&log)),
            recording("a", Arc::clone(&log)),
            recording("a/b", Arc::clone(&log)),
        ];
        let handler = counting_handler(Arc::clone(&calls));

        let chain = Chain::new(steps.iter().collect(), &handler, Duration::from_secs(5));
        let res = chain.run(ctx()).await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock().unwrap(), ["", "a", "a/b"]);
        // Each step saw the merges of the ones before it.
        let crate::response::Body::Json(body) = res.body() else { panic!("expected json") };
        assert_eq!(body["steps"], json!({ "": 0, "a": 1, "a/b": 1 }));
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = [
            recording("", Arc::clone(&log)),
            descriptor("a", |_ctx: Arc<RequestContext>, _next: Next| async {
                Response::builder().status(StatusCode::FORBIDDEN).text("nope")
            }),
            recording("a/b", Arc::clone(&log)),
        ];
        let handler = counting_handler(Arc::clone(&calls));

        let chain = Chain::new(steps.iter().collect(), &handler, Duration::from_secs(5));
        let res = chain.run(ctx()).await.unwrap().unwrap();

        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.text_body(), Some("nope"));
        assert_eq!(*log.lock().unwrap(), [""]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_middleware_times_out_with_its_anchor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = [
            descriptor("a", |_ctx: Arc<RequestContext>, next: Next| async move {
                std::future::pending::<()>().await;
                next.proceed()
            }),
        ];
        let handler = counting_handler(Arc::clone(&calls));

        let started = tokio::time::Instant::now();
        let chain = Chain::new(steps.iter().collect(), &handler, Duration::from_millis(5000));
        let err = chain.run(ctx()).await.unwrap_err();

        assert!(matches!(&err, Error::MiddlewareTimeout { anchor, .. } if anchor == "a"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn middleware_errors_fail_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = [
            descriptor("", |_ctx: Arc<RequestContext>, _next: Next| async {
                Err::<Control, _>(Error::msg("boom"))
            }),
        ];
        let handler = counting_handler(Arc::clone(&calls));

        let chain = Chain::new(steps.iter().collect(), &handler, Duration::from_secs(5));
        let err = chain.run(ctx()).await.unwrap_err();

        assert!(matches!(err, Error::Message(m) if m == "boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_middleware_runs_the_handler_directly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&calls));

        let chain = Chain::new(Vec::new(), &handler, Duration::from_secs(5));
        assert!(chain.run(ctx()).await.unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A route keeps one handler per method plus optional `any` and `fallback`
//! handlers, and every one of them is a different closure type. They are
//! stored uniformly as trait objects:
//!
//! ```text
//! async fn show(ctx: RequestContext) -> Json<User> { … }   ← user writes this
//!        ↓ RouteDefinition::new("users/[id]").get(show)
//! show.into_boxed_handler()                              ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                              ← stored as BoxedHandler
//!        ↓
//! handler.call(ctx)  at request time                     ← one vtable dispatch
//!        ↓
//! Box::pin(async { show(ctx).await.into_outcome() })     ← BoxFuture<Outcome>
//! ```
//!
//! A handler may produce a response, produce nothing (the dispatcher answers
//! `204 No Content`) or fail; [`IntoOutcome`] folds all three into one
//! [`Outcome`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Error;
use crate::response::{IntoResponse, Json, Response};

// ── Internal types ───────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler settles with: a response, nothing, or a failure.
pub type Outcome = Result<Option<Response>, Error>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, Outcome>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ─────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `async fn`
/// with the signature:
///
/// ```text
/// async fn name(ctx: RequestContext) -> impl IntoOutcome
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

// ── IntoOutcome ──────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into an [`Outcome`].
///
/// `()` and `None` mean "no response"; `Err` converts into [`Error`], so
/// `?` works inside handlers for any error type `Error` can be built from.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome { Ok(None) }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Outcome { Ok(Some(self)) }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome { Ok(Some(self.into_response())) }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome { Ok(Some(self.into_response())) }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Outcome { Ok(Some(self.into_response())) }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> Outcome { Ok(Some(self.into_response())) }
}

impl<T: Serialize> IntoOutcome for Json<T> {
    fn into_outcome(self) -> Outcome {
        Ok(Some(serde_json::to_value(&self.0).map(Response::json)?))
    }
}

impl<T: IntoResponse> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome { Ok(self.map(IntoResponse::into_response)) }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<Error>,
{
    fn into_outcome(self) -> Outcome {
        self.map_err(Into::into)?.into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use crate::method::Method;

    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::Get, "/", http::HeaderMap::new())
    }

    #[tokio::test]
    async fn unit_means_no_response() {
        async fn nothing(_ctx: RequestContext) {}

        let outcome = nothing.into_boxed_handler().call(ctx()).await;
        assert!(matches!(outcome, Ok(None)));
    }

    #[tokio::test]
    async fn errors_propagate_through_question_mark() {
        async fn parse(_ctx: RequestContext) -> Result<String, Error> {
            let n: u32 = "nope".parse().map_err(|_| Error::msg("not a number"))?;
            Ok(n.to_string())
        }

        let outcome = parse.into_boxed_handler().call(ctx()).await;
        assert!(matches!(outcome, Err(Error::Message(m)) if m == "not a number"));
    }

    #[tokio::test]
    async fn closures_are_handlers() {
        let handler = |ctx: RequestContext| async move {
            format!("{}:{}", ctx.method(), ctx.path())
        };

        let res = handler.into_boxed_handler().call(ctx()).await.unwrap().unwrap();
        assert_eq!(res.text_body(), Some("GET:/"));
    }
}

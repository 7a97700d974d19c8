//! Path-scoped middleware.
//!
//! A middleware is registered at exactly one anchor, a template prefix such
//! as `""` (the root), `admin` or `users/[id]`. It applies to every route
//! whose pathname has that anchor among its cumulative prefixes, and the
//! applicable middleware run root-first, so an ancestor (authentication,
//! say) always settles before anything nested below it.
//!
//! Each middleware gets a shared view of the [`RequestContext`] and a
//! one-shot [`Next`] token, and settles with a [`Control`]:
//!
//! ```rust
//! use std::sync::Arc;
//! use http::StatusCode;
//! use serde_json::json;
//! use trailhead::{Control, Next, RequestContext, Response};
//!
//! async fn authenticate(ctx: Arc<RequestContext>, next: Next) -> Control {
//!     match ctx.header("authorization") {
//!         Some(token) => next.with(json!({ "user": { "token": token } })),
//!         None => Control::Respond(Response::status(StatusCode::UNAUTHORIZED)),
//!     }
//! }
//! ```
//!
//! A step settles exactly once, so it cannot both respond and proceed:
//! whatever it returns is what happens.

mod chain;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::response::Response;

pub(crate) use chain::Chain;

// ── Control flow ─────────────────────────────────────────────────────────────

/// How a middleware step settled.
#[derive(Debug)]
pub enum Control {
    /// Continue with the next step, merging the data (if any) into
    /// [`RequestContext::custom`] first.
    Next(Option<Value>),
    /// Short-circuit: answer with this response; nothing further runs.
    Respond(Response),
}

/// The continuation capability handed to each middleware.
///
/// Consumed on use, so a step can proceed at most once.
#[derive(Debug)]
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Proceed without contributing data.
    pub fn proceed(self) -> Control {
        Control::Next(None)
    }

    /// Proceed, deep-merging `data` into the context's data bag.
    pub fn with(self, data: Value) -> Control {
        Control::Next(Some(data))
    }
}

/// Conversion of a middleware's return value into a [`Control`].
pub trait IntoControl {
    fn into_control(self) -> Result<Control, Error>;
}

impl IntoControl for Control {
    fn into_control(self) -> Result<Control, Error> { Ok(self) }
}

impl IntoControl for Response {
    fn into_control(self) -> Result<Control, Error> { Ok(Control::Respond(self)) }
}

impl<T, E> IntoControl for Result<T, E>
where
    T: IntoControl,
    E: Into<Error>,
{
    fn into_control(self) -> Result<Control, Error> {
        self.map_err(Into::into)?.into_control()
    }
}

// ── Type erasure ─────────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, ctx: Arc<RequestContext>, next: Next) -> BoxFuture<'static, Result<Control, Error>>;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware:
///
/// ```text
/// async fn name(ctx: Arc<RequestContext>, next: Next) -> impl IntoControl
/// ```
///
/// Sealed, like [`Handler`](crate::Handler).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Arc<RequestContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoControl + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Arc<RequestContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoControl + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Arc<RequestContext>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoControl + Send + 'static,
{
    fn call(&self, ctx: Arc<RequestContext>, next: Next) -> BoxFuture<'static, Result<Control, Error>> {
        let fut = (self.0)(ctx, next);
        Box::pin(async move { fut.await.into_control() })
    }
}

// ── Descriptor ───────────────────────────────────────────────────────────────

/// A middleware bound to its anchor.
#[derive(Clone)]
pub struct MiddlewareDescriptor {
    anchor:  String,
    handler: BoxedMiddleware,
}

impl MiddlewareDescriptor {
    pub(crate) fn new(anchor: String, handler: BoxedMiddleware) -> Self {
        Self { anchor, handler }
    }

    /// The normalized anchor, `""` for the root.
    pub fn anchor(&self) -> &str { &self.anchor }

    pub(crate) fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, Result<Control, Error>> {
        self.handler.call(ctx, Next::new())
    }
}

impl std::fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareDescriptor").field("anchor", &self.anchor).finish_non_exhaustive()
    }
}

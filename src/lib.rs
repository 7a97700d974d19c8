//! # trailhead
//!
//! The request-dispatch core of a file-system-convention REST router.
//!
//! ## The contract
//!
//! Something else discovers your route modules, parses HTTP and writes bytes
//! to sockets. trailhead does the part in between: given a method, a path,
//! headers and a query it
//!
//! - orders every discovered template by specificity, so `users/me` always
//!   wins over `users/[id]` no matter which was discovered first;
//! - finds every structural match, picks the first with a handler for the
//!   method, and tells a `404` apart from a `405`;
//! - runs the path-scoped middleware chain root-first, each step under its
//!   own timeout, merging what each step contributes into the context;
//! - calls the handler and maps whatever comes back, including failures,
//!   onto exactly one [`Response`], which [`sink::emit`] replays as events.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http::HeaderMap;
//! use serde_json::json;
//! use trailhead::{Control, Method, Next, RequestContext, Response, RouteDefinition, Router};
//!
//! async fn show_user(ctx: RequestContext) -> Response {
//!     let id = ctx.param("id").unwrap_or("unknown");
//!     Response::json(json!({ "id": id, "viewer": ctx.custom().get("user") }))
//! }
//!
//! async fn authenticate(ctx: Arc<RequestContext>, next: Next) -> Control {
//!     match ctx.header("authorization") {
//!         Some(_) => next.with(json!({ "user": "ada" })),
//!         None => Control::Respond(Response::status(http::StatusCode::UNAUTHORIZED)),
//!     }
//! }
//!
//! # async fn run() -> trailhead::Result<()> {
//! let router = Router::builder()
//!     .route(RouteDefinition::new("users/[id]").get(show_user))
//!     .middleware("users", authenticate)
//!     .build()?;
//!
//! let ctx = RequestContext::new(Method::Get, "/users/42", HeaderMap::new());
//! let res = router.dispatch(ctx).await;
//! assert_eq!(res.status_code(), http::StatusCode::UNAUTHORIZED);
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod cookie;
mod error;
mod handler;
mod method;
mod registry;
mod response;
mod router;
mod template;

pub mod middleware;
pub mod sink;
pub mod static_files;

pub use config::{Config, DEFAULT_MIDDLEWARE_TIMEOUT_MS};
pub use context::RequestContext;
pub use cookie::{Cookie, SameSite};
pub use error::{Error, Result};
pub use handler::{BoxFuture, Handler, IntoOutcome, Outcome};
pub use method::Method;
pub use middleware::{Control, IntoControl, Middleware, MiddlewareDescriptor, Next};
pub use registry::{RouteDefinition, RouteEntry, RouteRegistry, specificity};
pub use response::{Body, BodyStream, IntoResponse, Json, Response, ResponseBuilder};
pub use router::{Router, RouterBuilder};
pub use template::RouteIdentity;

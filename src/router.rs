//! The dispatcher.
//!
//! A [`Router`] is built once at startup from the discovered routes and
//! middleware, then shared (behind an `Arc`) by every in-flight request.
//! Per request it applies a fixed precedence:
//!
//! 1. a static asset under the configured root is served directly, whatever
//!    the method;
//! 2. no structurally matching template → `404`;
//! 3. matching templates, none for this method → `405`;
//! 4. otherwise the middleware chain and the handler produce the response.
//!
//! Failures from steps 2 to 4, panics included, are translated into a
//! response here, once.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use http::header::ALLOW;
use http::{HeaderValue, StatusCode};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::handler::Outcome;
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Chain, Middleware, MiddlewareDescriptor};
use crate::registry::{RouteDefinition, RouteEntry, RouteRegistry, resolve};
use crate::response::Response;
use crate::static_files::{AssetResolver, StaticDir};
use crate::template::RouteIdentity;

// ── RouterBuilder ────────────────────────────────────────────────────────────

/// Collects registrations; [`RouterBuilder::build`] validates and orders them.
pub struct RouterBuilder {
    base_path:  PathBuf,
    config:     Config,
    routes:     Vec<RouteDefinition>,
    middleware: Vec<(String, BoxedMiddleware)>,
    assets:     Arc<dyn AssetResolver>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self {
            base_path:  PathBuf::from("."),
            config:     Config::default(),
            routes:     Vec::new(),
            middleware: Vec::new(),
            assets:     Arc::new(StaticDir),
        }
    }

    /// Directory the static root (and anything else relative) resolves against.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Registers a route. Returns `self` for chaining.
    pub fn route(mut self, route: RouteDefinition) -> Self {
        self.routes.push(route);
        self
    }

    /// Registers a middleware at `anchor` (`"/"` or `""` for the root).
    pub fn middleware(mut self, anchor: impl Into<String>, middleware: impl Middleware) -> Self {
        self.middleware.push((anchor.into(), middleware.into_boxed_middleware()));
        self
    }

    /// Replaces the static asset resolver.
    pub fn assets(mut self, resolver: impl AssetResolver) -> Self {
        self.assets = Arc::new(resolver);
        self
    }

    /// Compiles every template and anchor and orders the routes.
    pub fn build(self) -> Result<Router> {
        let registry = RouteRegistry::new(self.routes)?;

        let mut middleware = HashMap::new();
        for (anchor, handler) in self.middleware {
            let anchor = RouteIdentity::parse(&anchor)?.pathname().to_owned();
            if middleware.contains_key(&anchor) {
                return Err(Error::DuplicateMiddleware { anchor });
            }
            let descriptor = MiddlewareDescriptor::new(anchor.clone(), handler);
            middleware.insert(anchor, descriptor);
        }

        let static_root = self.config.static_dir.as_ref().map(|dir| self.base_path.join(dir));

        info!(
            routes = registry.len(),
            middleware = middleware.len(),
            static_root = ?static_root,
            "router built",
        );

        Ok(Router {
            registry,
            middleware,
            static_root,
            assets: self.assets,
            config: self.config,
        })
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

/// The immutable routing table and its dispatch loop.
pub struct Router {
    registry:    RouteRegistry,
    middleware:  HashMap<String, MiddlewareDescriptor>,
    static_root: Option<PathBuf>,
    assets:      Arc<dyn AssetResolver>,
    config:      Config,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Routes in specificity order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.registry.iter()
    }

    /// Middleware that applies to `identity`, root first.
    pub fn middleware_for(&self, identity: &RouteIdentity) -> Vec<&MiddlewareDescriptor> {
        identity.prefixes().filter_map(|prefix| self.middleware.get(prefix)).collect()
    }

    /// Dispatches one request. Never fails: every error becomes a response.
    pub async fn dispatch(&self, ctx: RequestContext) -> Response {
        let method = ctx.method();
        let path = ctx.path().to_owned();

        if let Some(res) = self.serve_static(&ctx).await {
            return res;
        }

        let res = match AssertUnwindSafe(self.route(ctx)).catch_unwind().await {
            Ok(Ok(Some(res))) => res,
            Ok(Ok(None))      => Response::status(StatusCode::NO_CONTENT),
            Ok(Err(err))      => self.error_response(err),
            Err(panic)        => self.error_response(Error::Message(panic_message(&*panic))),
        };
        debug!(%method, path = %path, status = %res.status_code(), "dispatched");
        res
    }

    async fn serve_static(&self, ctx: &RequestContext) -> Option<Response> {
        let root = self.static_root.as_deref()?;
        let asset = self.assets.resolve(root, ctx.path()).await?;
        debug!(path = ctx.path(), file = %asset.path.display(), "serving static asset");

        let res = match asset.into_response().await {
            Ok(mut res) if ctx.method() == Method::Head => {
                let headers = std::mem::take(res.headers_mut());
                let mut head = Response::status(StatusCode::OK);
                *head.headers_mut() = headers;
                head
            }
            Ok(res) => res,
            Err(err) => self.error_response(err),
        };
        Some(res)
    }

    async fn route(&self, mut ctx: RequestContext) -> Outcome {
        let matches = self.registry.matches(ctx.path());
        if matches.is_empty() {
            return Err(Error::RouteNotFound { path: ctx.path().to_owned() });
        }

        let Some((route, handler)) = resolve(&matches, ctx.method()) else {
            return Ok(Some(self.method_not_allowed(&matches)));
        };

        let identity = route.identity();
        debug!(path = ctx.path(), route = identity.pathname(), "route resolved");

        let params = identity.extract(ctx.path());
        debug_assert!(params.is_some(), "resolved route `{}` must match its path", identity.pathname());
        ctx.set_params(params.unwrap_or_default());

        let chain = Chain::new(self.middleware_for(identity), handler, self.config.middleware_timeout());
        chain.run(ctx).await
    }

    fn method_not_allowed(&self, matches: &[&RouteEntry]) -> Response {
        let mut allowed: Vec<Method> = matches.iter().flat_map(|r| r.methods()).collect();
        allowed.sort();
        allowed.dedup();
        let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");

        let mut res = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .text(self.config.method_not_allowed_message.clone());
        if let Ok(value) = HeaderValue::from_str(&allow) {
            res.headers_mut().insert(ALLOW, value);
        }
        res
    }

    fn error_response(&self, err: Error) -> Response {
        let status = err.status();
        let body = match err {
            Error::Abort(res) => return *res,
            Error::RouteNotFound { .. } => self.config.not_found_message.clone(),
            Error::MethodNotAllowed { .. } => self.config.method_not_allowed_message.clone(),
            other => {
                error!(error = %other, "request failed");
                other.to_string()
            }
        };
        Response::builder().status(status).text(body)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "request handler panicked".to_owned()
}

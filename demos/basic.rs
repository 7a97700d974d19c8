//! Minimal trailhead example: a hyper server in front of the dispatcher.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42 -H 'authorization: Bearer t'
//!   curl http://localhost:3000/users/me -H 'authorization: Bearer t'
//!   curl http://localhost:3000/users/42            # 401 from middleware
//!   curl -X PATCH http://localhost:3000/users/42   # 405 with Allow
//!   curl http://localhost:3000/nope                # 404

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::SET_COOKIE;
use http::{HeaderValue, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use trailhead::sink::{self, ResponseEvent};
use trailhead::{Config, Control, Next, RequestContext, Response, RouteDefinition, Router};

#[tokio::main]
async fn main() -> trailhead::Result<()> {
    tracing_subscriber::fmt::init();

    // Optional: `trailhead.toml` next to the binary overrides the defaults.
    let config = match Config::load("trailhead.toml") {
        Ok(config) => config,
        Err(trailhead::Error::Io(_)) => Config::default().with_static_dir("public"),
        Err(e) => return Err(e),
    };

    let router = Router::builder()
        .config(config)
        .route(RouteDefinition::new("users/[id]").get(get_user).delete(delete_user))
        .route(RouteDefinition::new("users/me").get(get_me))
        .route(RouteDefinition::new("users").post(create_user))
        .middleware("/", request_id)
        .middleware("users", authenticate)
        .build()?;

    let router = Arc::new(router);
    let addr: SocketAddr = ([0, 0, 0, 0], 3000).into();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!("accept error: {e}");
                continue;
            }
        };

        let router = Arc::clone(&router);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let router = Arc::clone(&router);
                async move { serve(router, req).await }
            });

            if let Err(e) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, svc).await {
                error!(%peer, "connection error: {e}");
            }
        });
    }
}

/// Maps one hyper request through the router and back.
async fn serve(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, _body) = req.into_parts();

    let ctx = match RequestContext::from_parts(&parts) {
        Ok(ctx) => ctx,
        Err(e) => {
            let mut res = http::Response::new(Full::new(Bytes::from(e.to_string())));
            *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
            return Ok(res);
        }
    };

    let response = router.dispatch(ctx).await;

    let mut out = http::Response::new(Full::default());
    let mut body = BytesMut::new();
    let emitted = sink::emit(response, &parts.headers, |event| match event {
        ResponseEvent::SetCookie(cookie) => {
            if let Ok(value) = HeaderValue::from_str(&cookie.to_header_value()) {
                out.headers_mut().append(SET_COOKIE, value);
            }
        }
        ResponseEvent::ClearCookie(name) => {
            if let Ok(value) = HeaderValue::from_str(&format!("{name}=; Path=/; Max-Age=0")) {
                out.headers_mut().append(SET_COOKIE, value);
            }
        }
        ResponseEvent::SetHeader(name, value) => {
            out.headers_mut().append(name, value);
        }
        ResponseEvent::SetStatus(status) => *out.status_mut() = status,
        ResponseEvent::WriteChunk(chunk) => body.extend_from_slice(&chunk),
        ResponseEvent::End => {}
    })
    .await;

    if let Err(e) = emitted {
        error!("failed to emit response: {e}");
        let mut res = http::Response::new(Full::default());
        *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(res);
    }

    *out.body_mut() = Full::new(body.freeze());
    Ok(out)
}

// ── Middleware ───────────────────────────────────────────────────────────────

async fn request_id(ctx: Arc<RequestContext>, next: Next) -> Control {
    let id = ctx.header("x-request-id").unwrap_or("local").to_owned();
    next.with(json!({ "request": { "id": id } }))
}

async fn authenticate(ctx: Arc<RequestContext>, next: Next) -> Control {
    match ctx.header("authorization").and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => next.with(json!({ "user": { "name": "alice", "token": token } })),
        None => Control::Respond(Response::status(StatusCode::UNAUTHORIZED)),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

// GET /users/[id]
async fn get_user(ctx: RequestContext) -> Response {
    let id = ctx.param("id").unwrap_or("unknown");
    Response::json(json!({ "id": id, "request": ctx.custom().get("request") }))
}

// GET /users/me beats /users/[id]
async fn get_me(ctx: RequestContext) -> trailhead::Result<Response> {
    let name: Option<String> = ctx.custom_as("user")?
        .and_then(|user: serde_json::Value| user.get("name")?.as_str().map(str::to_owned));
    Ok(Response::json(json!({ "me": name })))
}

// POST /users
async fn create_user(_ctx: RequestContext) -> Response {
    Response::builder()
        .status(StatusCode::CREATED)
        .header(http::header::LOCATION, HeaderValue::from_static("/users/99"))
        .json(json!({ "id": "99" }))
}

// DELETE /users/[id] answers 204 by returning nothing.
async fn delete_user(_ctx: RequestContext) {}

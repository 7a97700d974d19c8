//! Outgoing response type and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is assembled once, by a handler, a middleware or the
//! dispatcher itself, and then handed to the [`sink`](crate::sink) which
//! turns it into events. The body is never serialized here: JSON bodies stay
//! as [`serde_json::Value`] and streamed bodies stay opaque readers until the
//! sink pulls them.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncRead;

use crate::cookie::Cookie;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// ── Body ─────────────────────────────────────────────────────────────────────

/// An opaque byte source, e.g. an open file.
pub type BodyStream = Pin<Box<dyn AsyncRead + Send + Sync + 'static>>;

/// A response body.
pub enum Body {
    /// No body at all.
    Empty,
    /// A complete in-memory body.
    Bytes(Bytes),
    /// A structured value, serialized as JSON by the sink.
    Json(Value),
    /// A body read incrementally by the sink.
    Stream(BodyStream),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty        => f.write_str("Empty"),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Json(value)  => f.debug_tuple("Json").field(value).finish(),
            Self::Stream(_)    => f.write_str("Stream(..)"),
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use trailhead::Response;
/// use http::StatusCode;
/// use serde_json::json;
///
/// Response::json(json!({ "id": 1 }));
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use trailhead::Response;
/// use http::{HeaderValue, StatusCode, header::LOCATION};
/// use serde_json::json;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(LOCATION, HeaderValue::from_static("/users/42"))
///     .json(json!({ "id": 42 }));
/// ```
#[derive(Debug)]
pub struct Response {
    status:  StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    cleared: Vec<String>,
    body:    Body,
}

impl Response {
    /// `200 OK` with a structured body.
    pub fn json(value: Value) -> Self {
        Self::builder().json(value)
    }

    /// `200 OK` with a `text/plain; charset=utf-8` body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Body { &self.body }
    pub fn cookies(&self) -> &[Cookie] { &self.cookies }
    pub fn cleared_cookies(&self) -> &[String] { &self.cleared }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Adds a cookie to set on the client.
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Asks the client to drop a cookie it sent.
    pub fn clear_cookie(mut self, name: impl Into<String>) -> Self {
        self.cleared.push(name.into());
        self
    }

    /// The body of a `text/plain` response as a string, if it is one.
    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            Body::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Vec<Cookie>, Vec<String>, Body) {
        (self.status, self.headers, self.cookies, self.cleared, self.body)
    }
}

// ── ResponseBuilder ──────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status:  StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header; repeated names keep every value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Terminate with a structured body.
    pub fn json(self, value: Value) -> Response {
        self.finish(Body::Json(value))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(TEXT_PLAIN, Bytes::from(body.into()))
    }

    /// Terminate with an in-memory body of the given content type.
    pub fn bytes(mut self, content_type: &'static str, body: impl Into<Bytes>) -> Response {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.finish(Body::Bytes(body.into()))
    }

    /// Terminate with a streamed body of the given content type.
    pub fn stream<R>(mut self, content_type: &'static str, reader: R) -> Response
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.finish(Body::Stream(Box::pin(reader)))
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        self.finish(Body::Empty)
    }

    fn finish(self, body: Body) -> Response {
        Response {
            status:  self.status,
            headers: self.headers,
            cookies: Vec::new(),
            cleared: Vec::new(),
            body,
        }
    }
}

// ── IntoResponse ─────────────────────────────────────────────────────────────

/// Conversion into a [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response { Response::json(self) }
}

/// Serializes `T` into a structured `200 OK` body.
///
/// ```rust,ignore
/// #[derive(Serialize)]
/// struct User { id: u64 }
///
/// async fn get_user(ctx: RequestContext) -> Json<User> {
///     Json(User { id: 1 })
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.0) {
            Ok(value) => Response::json(value),
            Err(e) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(e.to_string()),
        }
    }
}

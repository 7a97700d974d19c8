//! Unified error type.
//!
//! Two families live here. Build-time errors (bad templates, duplicate
//! middleware anchors, unreadable config) come out of
//! [`RouterBuilder::build`](crate::RouterBuilder::build) and
//! [`Config::load`](crate::Config::load). Request-time errors come out of
//! handlers and middleware and are translated into a [`Response`] exactly
//! once, by [`Router::dispatch`](crate::Router::dispatch).

use std::time::Duration;

use http::StatusCode;

use crate::response::Response;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by trailhead's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Request-time ──────────────────────────────────────────────────────────
    /// No route template structurally matches the path.
    #[error("no route matches `{path}`")]
    RouteNotFound { path: String },

    /// At least one template matches the path, none for this method.
    #[error("method {method} is not allowed for `{path}`")]
    MethodNotAllowed { method: String, path: String },

    /// A middleware neither responded nor proceeded within its budget.
    #[error("middleware at `/{anchor}` timed out after {}ms", .timeout.as_millis())]
    MiddlewareTimeout { anchor: String, timeout: Duration },

    /// Abort the request with a ready-made response.
    ///
    /// Return this from a handler or middleware to bail out early with a
    /// specific response through the error channel; the dispatcher forwards
    /// it verbatim.
    #[error("request aborted with status {}", .0.status_code())]
    Abort(Box<Response>),

    /// A failure described by a message.
    #[error("{0}")]
    Message(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),

    // ── Build-time ────────────────────────────────────────────────────────────
    #[error("invalid route template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: &'static str },

    #[error("route template `{template}` declares parameter `{name}` twice")]
    DuplicateParam { template: String, name: String },

    #[error("middleware already registered at `/{anchor}`")]
    DuplicateMiddleware { anchor: String },

    #[error("unknown HTTP method `{0}`")]
    UnknownMethod(String),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for [`Error::Message`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Shorthand for [`Error::Abort`].
    pub fn abort(response: Response) -> Self {
        Self::Abort(Box::new(response))
    }

    /// Wraps any error type.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    /// The status this error maps to when it escapes to the dispatcher.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. }    => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Abort(res)              => res.status_code(),
            _                             => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Response> for Error {
    fn from(res: Response) -> Self {
        Self::abort(res)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_the_anchor() {
        let err = Error::MiddlewareTimeout {
            anchor:  "admin".to_owned(),
            timeout: Duration::from_millis(5000),
        };
        assert_eq!(err.to_string(), "middleware at `/admin` timed out after 5000ms");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn abort_carries_its_own_status() {
        let err = Error::abort(Response::status(StatusCode::UNAUTHORIZED));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "request aborted with status 401 Unauthorized");
    }
}

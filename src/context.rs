//! Per-request context.
//!
//! One [`RequestContext`] is created per request and threaded by value
//! through the middleware chain into the handler. Middleware sees it behind
//! an `Arc` and contributes to it only through the data it passes to
//! [`Next::with`](crate::Next::with); the chain merges that data into
//! [`RequestContext::custom`] before the next step starts.

use std::collections::HashMap;

use http::HeaderMap;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::method::Method;

/// Everything known about one in-flight request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    method:  Method,
    path:    String,
    headers: HeaderMap,
    query:   HashMap<String, Vec<String>>,
    params:  HashMap<String, String>,
    custom:  Map<String, Value>,
}

impl RequestContext {
    /// Creates a context from a request target such as `/users/42?tab=posts`.
    ///
    /// The query string is split off the path and decoded (`+` is a space).
    pub fn new(method: Method, target: &str, headers: HeaderMap) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method,
            path: path.to_owned(),
            headers,
            query: parse_query(query),
            params: HashMap::new(),
            custom: Map::new(),
        }
    }

    /// Creates a context from the head of an `http` request.
    pub fn from_parts(parts: &http::request::Parts) -> Result<Self> {
        let method = Method::try_from(&parts.method)?;
        let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        Ok(Self::new(method, target, parts.headers.clone()))
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Header lookup; names are case-insensitive. Non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Every value of a repeated query parameter, in request order.
    pub fn query_all(&self, name: &str) -> &[String] {
        self.query.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn query_map(&self) -> &HashMap<String, Vec<String>> { &self.query }

    /// Returns a named path parameter.
    ///
    /// For a route `users/[id]`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// The data bag accumulated by middleware.
    pub fn custom(&self) -> &Map<String, Value> { &self.custom }

    /// Deserializes one entry of the data bag.
    pub fn custom_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.custom
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
            .map_err(Into::into)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Deep-merges middleware data into the data bag.
    ///
    /// Objects merge key by key, recursively; any other value overwrites.
    /// `null` is a no-op, and a non-object top-level value has no key to
    /// land under, so it is dropped.
    pub(crate) fn merge_custom(&mut self, data: Value) {
        match data {
            Value::Object(patch) => deep_merge(&mut self.custom, patch),
            Value::Null => {}
            other => warn!(value = %other, "ignoring non-object middleware data"),
        }
    }
}

fn deep_merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        let Value::Object(incoming) = value else {
            target.insert(key, value);
            continue;
        };

        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            deep_merge(existing, incoming);
            continue;
        }
        target.insert(key, Value::Object(incoming));
    }
}

fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.entry(decode_component(key)).or_default().push(decode_component(value));
    }
    map
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " ")).decode_utf8_lossy().into_owned()
}

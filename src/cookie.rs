//! Cookies set or cleared by a response.

use std::fmt::Write as _;

use http::HeaderMap;
use http::header::COOKIE;

/// The `SameSite` attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax    => "Lax",
            Self::None   => "None",
        }
    }
}

/// A cookie to set on the client.
///
/// ```rust
/// use trailhead::{Cookie, SameSite};
///
/// let session = Cookie::new("session", "abc123")
///     .path("/")
///     .http_only()
///     .same_site(SameSite::Lax);
/// assert_eq!(session.to_header_value(), "session=abc123; Path=/; HttpOnly; SameSite=Lax");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cookie {
    name:      String,
    value:     String,
    path:      Option<String>,
    domain:    Option<String>,
    max_age:   Option<i64>,
    http_only: bool,
    secure:    bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name:      name.into(),
            value:     value.into(),
            path:      None,
            domain:    None,
            max_age:   None,
            http_only: false,
            secure:    false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Lifetime in seconds. Zero or negative expires the cookie immediately.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn value(&self) -> &str { &self.value }

    /// Renders the `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        // Writing into a String cannot fail.
        if let Some(path) = &self.path {
            let _ = write!(out, "; Path={path}");
        }
        if let Some(domain) = &self.domain {
            let _ = write!(out, "; Domain={domain}");
        }
        if let Some(max_age) = self.max_age {
            let _ = write!(out, "; Max-Age={max_age}");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            let _ = write!(out, "; SameSite={}", same_site.as_str());
        }
        out
    }
}

/// Whether the request carried a cookie named `name` in any `Cookie` header.
pub(crate) fn request_has_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .any(|(key, _)| key.trim() == name)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn renders_every_attribute() {
        let cookie = Cookie::new("id", "7")
            .path("/app")
            .domain("example.com")
            .max_age(3600)
            .http_only()
            .secure()
            .same_site(SameSite::Strict);
        assert_eq!(
            cookie.to_header_value(),
            "id=7; Path=/app; Domain=example.com; Max-Age=3600; HttpOnly; Secure; SameSite=Strict",
        );
    }

    #[test]
    fn finds_cookies_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; session=abc"));
        headers.append(COOKIE, HeaderValue::from_static("lang=en"));

        assert!(request_has_cookie(&headers, "session"));
        assert!(request_has_cookie(&headers, "lang"));
        assert!(!request_has_cookie(&headers, "sess"));
    }
}

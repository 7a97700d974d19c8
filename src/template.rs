//! Route templates and structural path matching.
//!
//! A template is a slash-separated pathname whose dynamic segments are
//! written in brackets, the way a file-system router names directories:
//!
//! ```text
//! users/[id]/posts/[post]   →  Literal("users") Param("id") Literal("posts") Param("post")
//! ```
//!
//! Matching is a positional automaton, not a regex. A path matches iff it
//! has the same number of segments, every literal segment is byte-equal and
//! every bracketed segment binds exactly one non-empty path segment.
//!
//! Catch-all syntax (`[...slug]`, `[[...slug]]`) and partially bracketed
//! segments (`v[version]`) are rejected when the template is parsed.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

// ── Segments ─────────────────────────────────────────────────────────────────

/// One parsed template segment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    fn parse(template: &str, raw: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidTemplate { template: template.to_owned(), reason };

        if raw.is_empty() {
            return Err(invalid("empty segment"));
        }

        let Some(name) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
            if raw.contains(['[', ']']) {
                return Err(invalid("brackets must enclose a whole segment"));
            }
            return Ok(Self::Literal(raw.to_owned()));
        };

        if name.starts_with("...") || name.starts_with('[') {
            return Err(invalid("catch-all segments are not supported"));
        }
        if name.is_empty() {
            return Err(invalid("empty parameter name"));
        }
        if name.contains(['[', ']']) {
            return Err(invalid("nested brackets in parameter name"));
        }
        Ok(Self::Param(name.to_owned()))
    }

    pub(crate) fn is_dynamic(&self) -> bool {
        matches!(self, Self::Param(_))
    }
}

// ── RouteIdentity ────────────────────────────────────────────────────────────

/// A compiled route template and its parameter shape.
#[derive(Clone, Debug)]
pub struct RouteIdentity {
    pathname:   String,
    segments:   Vec<Segment>,
    param_keys: Vec<String>,
    route:      String,
}

impl RouteIdentity {
    /// Compiles `template`. The declared route string defaults to the
    /// template as written; see [`RouteIdentity::declared_as`].
    pub fn parse(template: &str) -> Result<Self> {
        let pathname = normalize(template).to_owned();

        let segments = split(&pathname)
            .map(|raw| Segment::parse(template, raw))
            .collect::<Result<Vec<_>>>()?;

        let mut param_keys: Vec<String> = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if param_keys.contains(name) {
                    return Err(Error::DuplicateParam {
                        template: template.to_owned(),
                        name:     name.clone(),
                    });
                }
                param_keys.push(name.clone());
            }
        }

        Ok(Self { pathname, segments, param_keys, route: template.to_owned() })
    }

    /// Records the route string the template was declared with (for example
    /// the source file it was discovered in). Only used for ordering ties.
    pub fn declared_as(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// The normalized template, e.g. `users/[id]`. The root route is `""`.
    pub fn pathname(&self) -> &str { &self.pathname }

    /// Parameter names in template order.
    pub fn param_keys(&self) -> &[String] { &self.param_keys }

    pub fn route(&self) -> &str { &self.route }

    pub(crate) fn segments(&self) -> &[Segment] { &self.segments }

    /// Whether `path` is structurally conformant to this template.
    pub fn is_match(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Raw positional captures for the bracketed segments, in template order.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let mut parts = split(normalize(path));
        let mut captures = Vec::with_capacity(self.param_keys.len());

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(_) => captures.push(part),
            }
        }

        // Anchored at the end: leftover segments mean a longer path.
        if parts.next().is_some() {
            return None;
        }
        Some(captures)
    }

    /// Extracts and percent-decodes the parameters of a matching `path`.
    pub fn extract(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.captures(path)?;
        let params = self.param_keys.iter()
            .zip(captures)
            .map(|(key, raw)| (key.clone(), decode(raw)))
            .collect();
        Some(params)
    }

    /// Cumulative prefixes of the pathname, root first:
    /// `a/[id]/b` yields `""`, `a`, `a/[id]`, `a/[id]/b`.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        let cuts = self.pathname.match_indices('/').map(|(i, _)| i);
        let nested = (!self.pathname.is_empty()).then_some(self.pathname.len());

        std::iter::once(0)
            .chain(cuts)
            .chain(nested)
            .map(|end| &self.pathname[..end])
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Strips one leading and one trailing slash.
pub(crate) fn normalize(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Splits a normalized path. The empty path has no segments.
fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(move |_| !path.is_empty())
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

    use super::*;

    fn template(s: &str) -> RouteIdentity {
        RouteIdentity::parse(s).unwrap()
    }

    #[test]
    fn parses_literal_and_dynamic_segments() {
        let t = template("/users/[id]/posts/[post]/");
        assert_eq!(t.pathname(), "users/[id]/posts/[post]");
        assert_eq!(t.param_keys(), ["id", "post"]);
        assert_eq!(t.route(), "/users/[id]/posts/[post]/");
        assert_eq!(t.segments()[0], Segment::Literal("users".to_owned()));
        assert!(t.segments()[1].is_dynamic());
    }

    #[test]
    fn root_template_has_no_segments() {
        let t = template("/");
        assert_eq!(t.pathname(), "");
        assert!(t.is_match("/"));
        assert!(t.is_match(""));
        assert!(!t.is_match("/a"));
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for bad in ["a/[...slug]", "a/[[...slug]]", "v[version]", "a//b", "a/[]"] {
            assert!(
                matches!(RouteIdentity::parse(bad), Err(Error::InvalidTemplate { .. })),
                "{bad} should be rejected",
            );
        }
    }

    #[test]
    fn rejects_duplicate_parameter_names() {
        let err = RouteIdentity::parse("a/[id]/b/[id]").unwrap_err();
        assert!(matches!(err, Error::DuplicateParam { name, .. } if name == "id"));
    }

    #[test]
    fn matching_is_anchored_to_the_whole_path() {
        let t = template("a/[id]");
        assert!(t.is_match("/a/1"));
        assert!(t.is_match("/a/1/"));
        assert!(!t.is_match("/a"));
        assert!(!t.is_match("/a/1/b"));
        assert!(!t.is_match("/x/a/1"));
        assert!(!t.is_match("/a//"));
        assert!(!t.is_match("/A/1"));
    }

    #[test]
    fn extracts_decoded_params_in_template_order() {
        let t = template("files/[dir]/[name]");
        let params = t.extract("/files/my%20docs/caf%C3%A9.txt").unwrap();
        assert_eq!(params["dir"], "my docs");
        assert_eq!(params["name"], "café.txt");
    }

    #[test]
    fn extraction_inverts_encoding() {
        let t = template("a/[x]/b/[y]");
        let values = [
            ("plain", "42"),
            ("with space", "slash/inside"),
            ("100%", "ünïcødé ✓"),
            ("?query#frag", "+plus+"),
        ];

        for (x, y) in values {
            let path = format!(
                "/a/{}/b/{}",
                utf8_percent_encode(x, NON_ALPHANUMERIC),
                utf8_percent_encode(y, NON_ALPHANUMERIC),
            );
            let params = t.extract(&path).unwrap();
            let restored: Vec<&str> = t.param_keys().iter().map(|k| params[k].as_str()).collect();
            assert_eq!(restored, [x, y]);
        }
    }

    #[test]
    fn prefixes_run_from_root_to_full_pathname() {
        let t = template("a/[id]/b");
        assert_eq!(t.prefixes().collect::<Vec<_>>(), ["", "a", "a/[id]", "a/[id]/b"]);
        assert_eq!(template("/").prefixes().collect::<Vec<_>>(), [""]);
    }
}

//! Route registry: specificity ordering, structural matching and handler
//! resolution.
//!
//! The registry is built once, sorted once, and scanned top to bottom for
//! every request. Because the order puts more specific templates first, the
//! first structural match that has a handler for the request method is the
//! winner; there is no backtracking and no per-request sorting.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::Result;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::template::{RouteIdentity, Segment};

// ── RouteDefinition ──────────────────────────────────────────────────────────

/// One discovered route module: a template plus the handlers it exports.
///
/// ```rust
/// use trailhead::{RequestContext, RouteDefinition};
///
/// async fn show(ctx: RequestContext) -> String {
///     format!("user {}", ctx.param("id").unwrap_or_default())
/// }
///
/// let users = RouteDefinition::new("users/[id]")
///     .declared_as("routes/users/[id].rs")
///     .get(show);
/// ```
pub struct RouteDefinition {
    template: String,
    declared: Option<String>,
    handlers: MethodHandlers,
}

impl RouteDefinition {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into(), declared: None, handlers: MethodHandlers::default() }
    }

    /// The route string this template was declared with; ordering ties are
    /// broken on it. Defaults to the template.
    pub fn declared_as(mut self, route: impl Into<String>) -> Self {
        self.declared = Some(route.into());
        self
    }

    /// Binds a handler to one method. Binding the same method twice keeps the last.
    pub fn on(mut self, method: Method, handler: impl Handler) -> Self {
        self.handlers.by_method.insert(method, handler.into_boxed_handler());
        self
    }

    pub fn get(self, handler: impl Handler) -> Self { self.on(Method::Get, handler) }
    pub fn post(self, handler: impl Handler) -> Self { self.on(Method::Post, handler) }
    pub fn put(self, handler: impl Handler) -> Self { self.on(Method::Put, handler) }
    pub fn patch(self, handler: impl Handler) -> Self { self.on(Method::Patch, handler) }
    pub fn delete(self, handler: impl Handler) -> Self { self.on(Method::Delete, handler) }

    /// Handler for every method without a dedicated one.
    pub fn any(mut self, handler: impl Handler) -> Self {
        self.handlers.any = Some(handler.into_boxed_handler());
        self
    }

    /// Last-resort handler, consulted after `any`.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.handlers.fallback = Some(handler.into_boxed_handler());
        self
    }

    fn compile(self) -> Result<RouteEntry> {
        let mut identity = RouteIdentity::parse(&self.template)?;
        if let Some(route) = self.declared {
            identity = identity.declared_as(route);
        }
        Ok(RouteEntry { identity, handlers: self.handlers })
    }
}

// ── RouteEntry ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct MethodHandlers {
    by_method: HashMap<Method, BoxedHandler>,
    any:       Option<BoxedHandler>,
    fallback:  Option<BoxedHandler>,
}

/// A compiled route in the registry.
pub struct RouteEntry {
    identity: RouteIdentity,
    handlers: MethodHandlers,
}

impl RouteEntry {
    pub fn identity(&self) -> &RouteIdentity { &self.identity }

    /// The handler for `method`: dedicated, then `any`, then `fallback`.
    pub(crate) fn handler_for(&self, method: Method) -> Option<&BoxedHandler> {
        self.handlers.by_method.get(&method)
            .or(self.handlers.any.as_ref())
            .or(self.handlers.fallback.as_ref())
    }

    /// Methods with a dedicated handler, in `Allow` header order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        Method::ALL.into_iter().filter(|m| self.handlers.by_method.contains_key(m))
    }
}

// ── RouteRegistry ────────────────────────────────────────────────────────────

/// Every route, most specific first.
#[derive(Default)]
pub struct RouteRegistry {
    routes: Vec<RouteEntry>,
}

impl RouteRegistry {
    /// Compiles and orders `definitions`. Fails on the first invalid template.
    pub fn new(definitions: Vec<RouteDefinition>) -> Result<Self> {
        let mut routes = definitions.into_iter()
            .map(RouteDefinition::compile)
            .collect::<Result<Vec<_>>>()?;

        // Stable, so byte-identical templates keep registration order.
        routes.sort_by(|a, b| specificity(&a.identity, &b.identity));
        Ok(Self { routes })
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// Routes in specificity order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.iter()
    }

    /// Every route whose template structurally matches `path`, in
    /// specificity order.
    pub fn matches(&self, path: &str) -> Vec<&RouteEntry> {
        self.routes.iter().filter(|r| r.identity.is_match(path)).collect()
    }
}

/// Picks the first match exposing a handler for `method`.
pub(crate) fn resolve<'r>(
    matches: &[&'r RouteEntry],
    method: Method,
) -> Option<(&'r RouteEntry, &'r BoxedHandler)> {
    matches.iter().find_map(|&route| route.handler_for(method).map(|h| (route, h)))
}

// ── Specificity ──────────────────────────────────────────────────────────────

/// Segment kind at one position; a missing segment sorts last.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Kind {
    Literal,
    Dynamic,
    Absent,
}

fn kind(segment: Option<&Segment>) -> Kind {
    match segment {
        Some(s) if s.is_dynamic() => Kind::Dynamic,
        Some(_)                   => Kind::Literal,
        None                      => Kind::Absent,
    }
}

/// Orders two templates so that the more specific one comes first.
///
/// 1. The first position where the segment kinds differ decides; a literal
///    beats a dynamic segment, and any segment beats a missing one.
/// 2. Otherwise the declared route strings, compared case-insensitively.
/// 3. Otherwise the longer pathname.
/// 4. Otherwise raw bytes, so only byte-identical templates compare equal.
pub fn specificity(a: &RouteIdentity, b: &RouteIdentity) -> Ordering {
    let len = a.segments().len().max(b.segments().len());
    let positional = (0..len)
        .map(|i| kind(a.segments().get(i)).cmp(&kind(b.segments().get(i))))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal);

    positional
        .then_with(|| cmp_ignore_case(a.route(), b.route()))
        .then_with(|| b.pathname().len().cmp(&a.pathname().len()))
        .then_with(|| a.pathname().cmp(b.pathname()))
        .then_with(|| a.route().cmp(b.route()))
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;

    async fn noop(_ctx: RequestContext) {}

    fn identity(template: &str) -> RouteIdentity {
        RouteIdentity::parse(template).unwrap()
    }

    fn order(templates: &[&str]) -> Vec<String> {
        let defs = templates.iter().map(|t| RouteDefinition::new(*t).get(noop)).collect();
        RouteRegistry::new(defs)
            .unwrap()
            .iter()
            .map(|r| r.identity().pathname().to_owned())
            .collect()
    }

    #[test]
    fn static_beats_dynamic_regardless_of_insertion_order() {
        assert_eq!(order(&["a/[id]", "a/static"]), ["a/static", "a/[id]"]);
        assert_eq!(order(&["a/static", "a/[id]"]), ["a/static", "a/[id]"]);
    }

    #[test]
    fn first_differing_position_decides() {
        assert_eq!(
            order(&["[org]/[repo]", "[org]/settings", "users/[id]"]),
            ["users/[id]", "[org]/settings", "[org]/[repo]"],
        );
    }

    #[test]
    fn same_shape_falls_back_to_declared_route() {
        let defs = vec![
            RouteDefinition::new("users/[id]").declared_as("Users/[id].rs").get(noop),
            RouteDefinition::new("users/[name]").declared_as("users/[a].rs").get(noop),
        ];
        let registry = RouteRegistry::new(defs).unwrap();
        let routes: Vec<_> = registry.iter().map(|r| r.identity().route()).collect();
        assert_eq!(routes, ["users/[a].rs", "Users/[id].rs"]);
    }

    #[test]
    fn longer_pathname_wins_final_tie() {
        let a = identity("x/[long_name]").declared_as("same");
        let b = identity("x/[id]").declared_as("same");
        assert_eq!(specificity(&a, &b), Ordering::Less);
        assert_eq!(specificity(&b, &a), Ordering::Greater);
    }

    #[test]
    fn only_identical_templates_compare_equal() {
        assert_eq!(specificity(&identity("a/[id]"), &identity("a/[id]")), Ordering::Equal);
        assert_ne!(specificity(&identity("A/[id]"), &identity("a/[id]")), Ordering::Equal);
    }

    #[test]
    fn comparator_is_total_and_transitive() {
        let templates = [
            "", "a", "b", "[x]", "a/b", "a/[id]", "[x]/b", "[x]/[y]", "a/b/c",
            "a/[id]/c", "[x]/[y]/[z]", "A/b", "a/[other]", "[y]", "users/me",
            "users/[id]", "users/[id]/posts",
        ];
        let ids: Vec<_> = templates.iter().map(|t| identity(t)).collect();

        for a in &ids {
            for b in &ids {
                assert_eq!(specificity(a, b), specificity(b, a).reverse());
                for c in &ids {
                    if specificity(a, b).is_le() && specificity(b, c).is_le() {
                        assert!(
                            specificity(a, c).is_le(),
                            "{} <= {} <= {} but not {0} <= {2}",
                            a.pathname(), b.pathname(), c.pathname(),
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn matches_keeps_every_structural_match_in_order() {
        let defs = vec![
            RouteDefinition::new("users/[id]").get(noop),
            RouteDefinition::new("users/me").post(noop),
            RouteDefinition::new("posts/[id]").get(noop),
        ];
        let registry = RouteRegistry::new(defs).unwrap();

        let hits: Vec<_> = registry.matches("/users/me").iter().map(|r| r.identity().pathname()).collect();
        assert_eq!(hits, ["users/me", "users/[id]"]);
        assert!(registry.matches("/nothing/here").is_empty());
    }

    #[test]
    fn resolve_skips_matches_without_a_handler_for_the_method() {
        let defs = vec![
            RouteDefinition::new("users/[id]").get(noop),
            RouteDefinition::new("users/me").post(noop),
        ];
        let registry = RouteRegistry::new(defs).unwrap();
        let matches = registry.matches("/users/me");

        let (post, _) = resolve(&matches, Method::Post).unwrap();
        assert_eq!(post.identity().pathname(), "users/me");

        let (get, _) = resolve(&matches, Method::Get).unwrap();
        assert_eq!(get.identity().pathname(), "users/[id]");

        assert!(resolve(&matches, Method::Patch).is_none());
    }

    #[test]
    fn any_and_fallback_cover_missing_methods() {
        let defs = vec![
            RouteDefinition::new("a").any(noop),
            RouteDefinition::new("b").fallback(noop),
        ];
        let registry = RouteRegistry::new(defs).unwrap();
        assert!(resolve(&registry.matches("/a"), Method::Delete).is_some());
        assert!(resolve(&registry.matches("/b"), Method::Options).is_some());
    }

    #[test]
    fn methods_lists_dedicated_handlers_in_allow_order() {
        let route = RouteDefinition::new("x").delete(noop).get(noop).compile().unwrap();
        assert_eq!(route.methods().collect::<Vec<_>>(), [Method::Get, Method::Delete]);
    }
}

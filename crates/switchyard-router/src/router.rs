//! High-level router API.

use http::Method;

use crate::node::Node;
use crate::{Lookup, RouteConflict, RouteMatch};

/// A radix tree router keyed by `(method, path template)`.
///
/// Routes are matched in O(k) time in the number of path segments. Static
/// segments take priority over placeholders, so `/recipes/latest` matches
/// before `/recipes/{id}`.
///
/// # Example
///
/// ```rust
/// use switchyard_router::{Lookup, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(Method::GET, "/recipes/{id}", "get_recipe").unwrap();
/// router.insert(Method::DELETE, "/recipes/{id}", "delete_recipe").unwrap();
///
/// match router.lookup(&Method::GET, "/recipes/7") {
///     Lookup::Found(m) => {
///         assert_eq!(*m.value, "get_recipe");
///         assert_eq!(m.params.get("id"), Some("7"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `value` for `method` on `template`.
    ///
    /// Fails if the same `(method, template)` pair is already registered, or
    /// if the template reuses a placeholder position under a different name.
    pub fn insert(&mut self, method: Method, template: &str, value: T) -> Result<(), RouteConflict> {
        self.root.insert(template, method, value)?;
        self.route_count += 1;
        Ok(())
    }

    /// Resolves a request path and method.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_, T> {
        let Some((table, params)) = self.root.match_path(path) else {
            return Lookup::NotFound;
        };

        match table.get(method) {
            Some(value) => Lookup::Found(RouteMatch { value, params }),
            None => Lookup::MethodNotAllowed(table.allowed().cloned().collect()),
        }
    }

    /// Number of registered `(method, template)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

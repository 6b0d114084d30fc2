//! Radix tree router for switchyard.
//!
//! Both runtimes compile their contract routes into a [`Router`]: the
//! gateway stores proxy targets, backend services store local dispatch
//! units. The router is generic over that value.
//!
//! # Features
//!
//! - **Radix tree matching**: O(k) lookup in the number of path segments
//! - **Ordered path parameters**: captured left to right as they appear in
//!   the template (`/orgs/{org}/recipes/{id}` yields `org`, then `id`)
//! - **Method tables**: routes that share a template but differ by method
//!   are independent entries
//! - **Conflict detection**: a repeated `(method, template)` pair is an error
//!
//! # Architecture
//!
//! ```text
//!                 (root)
//!                   │
//!               "recipes"
//!              [GET, POST]
//!                   │
//!          ┌────────┴────────┐
//!       "latest"           "{id}"
//!        [GET]      [GET, PUT, DELETE]
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod method_table;
mod node;
mod params;
mod router;

use std::fmt;

use http::Method;

pub use method_table::MethodTable;
pub use node::{Node, SegmentKind};
pub use params::PathParams;
pub use router::Router;

/// A successful route match.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    /// The value registered for the matched `(method, template)`.
    pub value: &'a T,
    /// Captured path parameters, in template order.
    pub params: PathParams,
}

/// Result of resolving a request against a [`Router`].
#[derive(Debug)]
pub enum Lookup<'a, T> {
    /// Path and method both matched.
    Found(RouteMatch<'a, T>),
    /// Path matched but not for this method; carries the allowed methods.
    MethodNotAllowed(Vec<Method>),
    /// No template matched the path.
    NotFound,
}

/// A route could not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConflict {
    message: String,
}

impl RouteConflict {
    pub(crate) fn duplicate(method: Method, template: &str) -> Self {
        Self {
            message: format!("{method} {template} is already registered"),
        }
    }

    pub(crate) fn param_name(template: &str, existing: &str, requested: &str) -> Self {
        Self {
            message: format!(
                "{template}: placeholder {requested} conflicts with {existing} at the same position"
            ),
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RouteConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RouteConflict {}

//! Handler registration.
//!
//! Contract routes name their handler with a string such as
//! `recipes.create_recipe`. A [`HandlerRegistry`] maps those names to typed
//! Rust functions; the dispatch compiler resolves every route against it at
//! startup, so an unknown name stops the process before it serves traffic.
//!
//! # Calling convention
//!
//! A handler receives one [`Invocation`]. Its positional arguments are, in
//! order:
//!
//! 1. the path parameters, left to right as they appear in the template
//! 2. the validated request body, when the route declares a request schema
//! 3. the persistence handle, when the service declares a database
//!
//! Routes without a request schema also receive the declared query
//! parameters as named options.
//!
//! # Example
//!
//! ```rust
//! use switchyard_service::{HandlerOutput, HandlerRegistry, Invocation};
//! use switchyard_core::MeshResult;
//!
//! async fn get_recipe(call: Invocation) -> MeshResult<HandlerOutput> {
//!     let id = call.path(0).unwrap_or_default().to_string();
//!     Ok(serde_json::json!({ "id": id }).into())
//! }
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register("recipes.get_recipe", get_recipe);
//! registry.register_sync("recipes.ping", |_call| Ok(serde_json::json!("pong").into()));
//! assert_eq!(registry.len(), 2);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use switchyard_core::{MeshError, MeshResult};
use switchyard_extract::QueryOptions;

use crate::persistence::DbHandle;

/// One positional argument passed to a handler.
#[derive(Debug, Clone)]
pub enum Argument {
    /// A path parameter captured from the route template.
    Path {
        /// Placeholder name.
        name: String,
        /// Raw segment value.
        value: String,
    },
    /// The request body, already validated against the route's schema.
    Body(Value),
    /// The request-scoped persistence handle.
    Handle(DbHandle),
}

impl Argument {
    /// Short label used in logs and tests: `path:id`, `body`, `handle`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Path { name, .. } => format!("path:{name}"),
            Self::Body(_) => "body".to_string(),
            Self::Handle(_) => "handle".to_string(),
        }
    }
}

/// Everything a handler is called with.
#[derive(Debug, Clone)]
pub struct Invocation {
    args: Vec<Argument>,
    options: QueryOptions,
}

impl Invocation {
    /// Builds an invocation from positional arguments and named options.
    #[must_use]
    pub fn new(args: Vec<Argument>, options: QueryOptions) -> Self {
        Self { args, options }
    }

    /// Positional arguments in binding order.
    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Named query options. Empty for routes with a request schema.
    #[must_use]
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// The `index`-th path parameter.
    #[must_use]
    pub fn path(&self, index: usize) -> Option<&str> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Argument::Path { value, .. } => Some(value.as_str()),
                _ => None,
            })
            .nth(index)
    }

    /// A path parameter by placeholder name.
    #[must_use]
    pub fn path_named(&self, name: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Path { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// The validated body, if the route declares a request schema.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Body(value) => Some(value),
            _ => None,
        })
    }

    /// Deserializes the validated body.
    ///
    /// # Errors
    ///
    /// Returns a 400 if there is no body, a 422 if it does not fit `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> MeshResult<T> {
        let body = self
            .body()
            .cloned()
            .ok_or_else(|| MeshError::validation("request body is required"))?;
        Ok(switchyard_extract::from_value(body)?)
    }

    /// The persistence handle, if the service declares a database.
    #[must_use]
    pub fn handle(&self) -> Option<&DbHandle> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Handle(handle) => Some(handle),
            _ => None,
        })
    }

    /// Parses the `index`-th path parameter.
    ///
    /// # Errors
    ///
    /// Returns a 400 naming the placeholder if the segment does not parse.
    pub fn parse_path<T: std::str::FromStr>(&self, index: usize) -> MeshResult<T> {
        let (name, value) = self
            .args
            .iter()
            .filter_map(|arg| match arg {
                Argument::Path { name, value } => Some((name, value)),
                _ => None,
            })
            .nth(index)
            .ok_or_else(|| MeshError::validation(format!("missing path parameter #{index}")))?;

        value.parse().map_err(|_| MeshError::Validation {
            message: format!("invalid path parameter '{name}': '{value}'"),
            field: Some(name.clone()),
            status: StatusCode::BAD_REQUEST,
        })
    }
}

/// What a handler produced: a status and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: Value,
}

impl HandlerOutput {
    /// A 200 response carrying `body`.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// A 201 response carrying `body`.
    #[must_use]
    pub fn created(body: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
        }
    }

    /// Serializes `body` into a 200 response.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `body` cannot be represented as JSON.
    pub fn json<T: Serialize>(body: &T) -> MeshResult<Self> {
        serde_json::to_value(body)
            .map(Self::ok)
            .map_err(|e| MeshError::internal(format!("failed to serialize response: {e}")))
    }

    /// Replaces the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<Value> for HandlerOutput {
    fn from(body: Value) -> Self {
        Self::ok(body)
    }
}

/// A handler's result: either ready now or still to be awaited.
pub enum Reply {
    /// Produced synchronously.
    Ready(MeshResult<HandlerOutput>),
    /// Produced by a future the dispatcher awaits.
    Pending(BoxFuture<'static, MeshResult<HandlerOutput>>),
}

impl Reply {
    /// Awaits the result if it is still pending.
    pub async fn resolve(self) -> MeshResult<HandlerOutput> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(fut) => fut.await,
        }
    }

    /// Whether the reply was produced synchronously.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A type-erased handler.
pub type HandlerFn = Arc<dyn Fn(Invocation) -> Reply + Send + Sync>;

/// Maps handler references to functions.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async handler. A later registration under the same
    /// name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MeshResult<HandlerOutput>> + Send + 'static,
    {
        let erased: HandlerFn = Arc::new(move |call| Reply::Pending(handler(call).boxed()));
        self.handlers.insert(name.into(), erased);
    }

    /// Registers a handler that returns its result directly.
    pub fn register_sync<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Invocation) -> MeshResult<HandlerOutput> + Send + Sync + 'static,
    {
        let erased: HandlerFn = Arc::new(move |call| Reply::Ready(handler(call)));
        self.handlers.insert(name.into(), erased);
    }

    /// Looks up a handler by reference.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}

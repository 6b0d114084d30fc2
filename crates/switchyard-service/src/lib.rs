//! # Switchyard Service
//!
//! Runtime for backend services described by a switchyard contract.
//!
//! - [`HandlerRegistry`] - maps contract handler references to Rust functions
//! - [`LocalDispatcher`] - compiles a service's routes into [`DispatchUnit`]s
//!   that validate, bind and invoke handlers in a fixed argument order
//! - [`Persistence`] - per-request acquire/release of a store handle
//! - [`ServiceRuntime`] - hyper server with trace propagation and health check
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchyard_core::{Contract, SchemaRegistry};
//! use switchyard_service::{HandlerRegistry, LocalDispatcher, ServiceRuntime};
//! use switchyard_telemetry::JsonLineSink;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let contract = Contract::load("contract.yaml", &SchemaRegistry::new())?;
//! let handlers = HandlerRegistry::new();
//! let sink = JsonLineSink::shared();
//!
//! let dispatcher = LocalDispatcher::compile(&contract, "recipes", &handlers, None, sink.as_ref())?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8001").await?;
//! ServiceRuntime::new(dispatcher, sink)
//!     .serve(listener, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod dispatch;
mod handler;
mod persistence;
mod server;

pub use dispatch::{DispatchUnit, LocalDispatcher, RequestParts};
pub use handler::{Argument, HandlerFn, HandlerOutput, HandlerRegistry, Invocation, Reply};
pub use persistence::{DbHandle, Persistence, PersistenceError};
pub use server::{HttpResponse, ServiceError, ServiceRuntime, DEFAULT_MAX_BODY_BYTES};

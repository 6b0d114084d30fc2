//! Switchyard Gateway - contract-driven edge proxy
//!
//! The gateway mounts every route of every service in a contract under the
//! contract's `urlPrefix` and forwards matching requests to the owning
//! service's base URL. It never runs handler logic.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────┐
//!   client ─────► │  Gateway                          │
//!                 │   GatewayTable  (urlPrefix+path)  │
//!                 │   trace id: adopt or synthesize   │
//!                 │   headers: drop framing headers   │
//!                 │   ProxyClient  (bounded timeout)  │
//!                 └────────────────┬─────────────────┘
//!                                  │  service.url + rendered template
//!                  ┌───────────────┼───────────────┐
//!                  ▼               ▼               ▼
//!              recipes          pantry          timers
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! $ switchyard-gateway --contract contract.yaml --listen 0.0.0.0:8080
//!
//! $ SWITCHYARD__UPSTREAM__TIMEOUT=5s \
//!   SWITCHYARD__CONTRACT__STRICT_VALIDATION=true \
//!   switchyard-gateway --config gateway.toml
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod headers;
pub mod proxy;
pub mod routes;
pub mod server;

pub use error::{GatewayError, GatewayResult};
pub use proxy::{ProxyClient, ProxyRequest, ProxyResponse};
pub use routes::{GatewayTable, ProxyTarget};
pub use server::{Gateway, GatewayBody, HttpResponse};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

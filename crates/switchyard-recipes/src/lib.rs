//! # Switchyard Recipes
//!
//! The recipes backend service: create, list, fetch, update and delete
//! recipes held in an in-memory store.
//!
//! The routes, their schemas and query parameters come from the `recipes`
//! service of the contract document; this crate only supplies the handlers
//! and the store behind the persistence handle.
//!
//! ```text
//! GET    /recipes        recipes.list_recipes    ?limit&offset&search&ingredient&sort
//! POST   /recipes        recipes.create_recipe   RecipeCreate -> RecipeOut (201)
//! GET    /recipes/{id}   recipes.get_recipe      -> RecipeOut
//! PUT    /recipes/{id}   recipes.update_recipe   RecipeUpdate -> RecipeOut
//! DELETE /recipes/{id}   recipes.delete_recipe   -> {"success": true}
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod handlers;
pub mod model;
mod store;

use std::sync::Arc;

use switchyard_core::{Contract, ContractResult};
use switchyard_service::{LocalDispatcher, Persistence, ServiceRuntime};
use switchyard_telemetry::SharedSink;

pub use handlers::{handlers, DEFAULT_LIMIT};
pub use model::{
    DeleteResponse, Ingredient, RecipeCreate, RecipeListResponse, RecipeOut, RecipeUpdate, Unit,
};
pub use store::{InMemoryPersistence, ListQuery, RecipeStore, StoreError};

/// Name of this service in the contract.
pub const SERVICE_NAME: &str = "recipes";

/// Service version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiles the recipes routes against `persistence`.
///
/// # Errors
///
/// Fails if the contract has no `recipes` service or one of its routes
/// names a handler this crate does not provide.
pub fn runtime(
    contract: &Contract,
    persistence: Arc<InMemoryPersistence>,
    sink: SharedSink,
) -> ContractResult<ServiceRuntime> {
    let persistence: Arc<dyn Persistence> = persistence;
    let dispatcher = LocalDispatcher::compile(
        contract,
        SERVICE_NAME,
        &handlers(),
        Some(persistence),
        sink.as_ref(),
    )?;
    Ok(ServiceRuntime::new(dispatcher, sink))
}

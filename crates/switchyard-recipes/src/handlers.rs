//! Route handlers for the recipes service.
//!
//! Every handler receives the store through its persistence handle and
//! wraps the store call in a `db_*` span.

use std::sync::Arc;

use http::StatusCode;
use switchyard_core::{MeshError, MeshResult};
use switchyard_service::{HandlerOutput, HandlerRegistry, Invocation};
use switchyard_telemetry::in_span;
use tracing::info;
use uuid::Uuid;

use crate::model::{
    DeleteResponse, InvalidSort, RecipeCreate, RecipeListResponse, RecipeUpdate, SortOrder,
};
use crate::store::{ListQuery, RecipeStore};

/// Page size when `limit` is not given.
pub const DEFAULT_LIMIT: usize = 20;

/// Registry with every recipes handler under its contract name.
#[must_use]
pub fn handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("recipes.create_recipe", create_recipe);
    registry.register("recipes.list_recipes", list_recipes);
    registry.register("recipes.get_recipe", get_recipe);
    registry.register("recipes.update_recipe", update_recipe);
    registry.register("recipes.delete_recipe", delete_recipe);
    registry
}

fn store(call: &Invocation) -> MeshResult<Arc<RecipeStore>> {
    call.handle()
        .and_then(|handle| handle.connection::<RecipeStore>())
        .ok_or_else(|| MeshError::internal("recipes store handle missing"))
}

fn recipe_id(call: &Invocation) -> MeshResult<Uuid> {
    call.parse_path(0)
}

async fn create_recipe(call: Invocation) -> MeshResult<HandlerOutput> {
    let data: RecipeCreate = call.body_as()?;
    data.validate()?;
    let store = store(&call)?;

    let recipe = in_span("db_create_recipe", async move { store.create(data) }).await?;
    info!(id = %recipe.id, title = %recipe.title, "recipe created");
    Ok(HandlerOutput::json(&recipe)?.with_status(StatusCode::CREATED))
}

async fn list_recipes(call: Invocation) -> MeshResult<HandlerOutput> {
    let options = call.options();
    let sort = options
        .get_str("sort")
        .map(str::parse::<SortOrder>)
        .transpose()
        .map_err(|e: InvalidSort| {
            MeshError::domain(StatusCode::BAD_REQUEST, "INVALID_SORT", e.to_string())
        })?;

    let query = ListQuery {
        limit: options
            .get_i64("limit")
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_LIMIT),
        offset: options
            .get_i64("offset")
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(0),
        search: options.get_str("search").map(ToString::to_string),
        ingredient: options.get_str("ingredient").map(ToString::to_string),
        sort,
    };
    let store = store(&call)?;

    let (total, data) = in_span("db_list_recipes", async { store.list(&query) }).await;
    HandlerOutput::json(&RecipeListResponse {
        total,
        limit: query.limit,
        offset: query.offset,
        data,
    })
}

async fn get_recipe(call: Invocation) -> MeshResult<HandlerOutput> {
    let id = recipe_id(&call)?;
    let store = store(&call)?;

    let recipe = in_span("db_query_recipe", async move { store.get(id) }).await?;
    HandlerOutput::json(&recipe)
}

async fn update_recipe(call: Invocation) -> MeshResult<HandlerOutput> {
    let id = recipe_id(&call)?;
    let data: RecipeUpdate = call.body_as()?;
    data.validate()?;
    let store = store(&call)?;

    let recipe = in_span("db_update_recipe", async move { store.update(id, data) }).await?;
    info!(id = %recipe.id, "recipe updated");
    HandlerOutput::json(&recipe)
}

async fn delete_recipe(call: Invocation) -> MeshResult<HandlerOutput> {
    let id = recipe_id(&call)?;
    let store = store(&call)?;

    in_span("db_delete_recipe", async move { store.delete(id) }).await?;
    info!(%id, "recipe deleted");
    HandlerOutput::json(&DeleteResponse { success: true })
}

//! In-memory recipe storage and its persistence adapter.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use http::StatusCode;
use indexmap::IndexMap;
use parking_lot::RwLock;
use switchyard_core::MeshError;
use switchyard_service::{DbHandle, Persistence, PersistenceError};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{normalize_title, RecipeCreate, RecipeOut, RecipeUpdate, SortField, SortOrder};

/// Store failures surfaced to clients.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No recipe has this id.
    #[error("Recipe not found")]
    NotFound(Uuid),

    /// Another recipe already uses this title.
    #[error("Recipe '{0}' already exists")]
    DuplicateTitle(String),
}

impl From<StoreError> for MeshError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound(id) => {
                MeshError::domain(StatusCode::NOT_FOUND, "RECIPE_NOT_FOUND", err.to_string())
                    .with_details(serde_json::json!({ "id": id }))
            }
            StoreError::DuplicateTitle(_) => {
                MeshError::domain(StatusCode::BAD_REQUEST, "DUPLICATE_RECIPE", err.to_string())
            }
        }
    }
}

/// Filters and pagination for a listing.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Page size.
    pub limit: usize,
    /// Matches to skip.
    pub offset: usize,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    /// Ingredient name that must appear, case-insensitive.
    pub ingredient: Option<String>,
    /// Ordering; insertion order when absent.
    pub sort: Option<SortOrder>,
}

/// Recipes keyed by id, in insertion order.
#[derive(Debug, Default)]
pub struct RecipeStore {
    recipes: RwLock<IndexMap<Uuid, RecipeOut>>,
}

impl RecipeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.read().is_empty()
    }

    /// Stores a new recipe.
    pub fn create(&self, data: RecipeCreate) -> Result<RecipeOut, StoreError> {
        let normalized_title = normalize_title(&data.title);
        let mut recipes = self.recipes.write();
        if recipes.values().any(|r| r.normalized_title == normalized_title) {
            return Err(StoreError::DuplicateTitle(data.title));
        }

        let now = Utc::now();
        let recipe = RecipeOut {
            id: Uuid::now_v7(),
            title: data.title,
            normalized_title,
            description: data.description,
            ingredients: data.ingredients,
            steps: data.steps,
            created_at: now,
            updated_at: now,
        };
        recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    /// Returns the total number of matches and the requested page.
    #[must_use]
    pub fn list(&self, query: &ListQuery) -> (usize, Vec<RecipeOut>) {
        let search = query.search.as_deref().map(str::to_lowercase);
        let ingredient = query.ingredient.as_deref().map(|i| i.trim().to_lowercase());

        let recipes = self.recipes.read();
        let mut matches: Vec<&RecipeOut> = recipes
            .values()
            .filter(|r| search.as_deref().map_or(true, |s| r.normalized_title.contains(s)))
            .filter(|r| {
                ingredient.as_deref().map_or(true, |wanted| {
                    r.ingredients.iter().any(|i| i.name.to_lowercase() == wanted)
                })
            })
            .collect();

        if let Some(order) = query.sort {
            matches.sort_by(|a, b| {
                let ord = compare(a, b, order.field);
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let total = matches.len();
        let page = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        (total, page)
    }

    /// Fetches one recipe.
    pub fn get(&self, id: Uuid) -> Result<RecipeOut, StoreError> {
        self.recipes
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Applies the fields present in `data`.
    pub fn update(&self, id: Uuid, data: RecipeUpdate) -> Result<RecipeOut, StoreError> {
        let mut recipes = self.recipes.write();

        if let Some(title) = &data.title {
            let normalized = normalize_title(title);
            if recipes
                .values()
                .any(|r| r.id != id && r.normalized_title == normalized)
            {
                return Err(StoreError::DuplicateTitle(title.clone()));
            }
        }

        let recipe = recipes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(title) = data.title {
            recipe.normalized_title = normalize_title(&title);
            recipe.title = title;
        }
        if let Some(description) = data.description {
            recipe.description = Some(description);
        }
        if let Some(ingredients) = data.ingredients {
            recipe.ingredients = ingredients;
        }
        if let Some(steps) = data.steps {
            recipe.steps = Some(steps);
        }
        recipe.updated_at = Utc::now();

        Ok(recipe.clone())
    }

    /// Removes a recipe.
    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.recipes
            .write()
            .shift_remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

fn compare(a: &RecipeOut, b: &RecipeOut, field: SortField) -> CmpOrdering {
    match field {
        SortField::Title => a.title.cmp(&b.title),
        SortField::NormalizedTitle => a.normalized_title.cmp(&b.normalized_title),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

/// Hands out the shared [`RecipeStore`] as a per-request handle.
#[derive(Debug)]
pub struct InMemoryPersistence {
    store: Arc<RecipeStore>,
    outstanding: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryPersistence {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<RecipeStore>) -> Self {
        Self {
            store,
            outstanding: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<RecipeStore> {
        &self.store
    }

    /// Handles acquired and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Refuses further acquisitions.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Persistence for InMemoryPersistence {
    fn acquire(&self) -> BoxFuture<'_, Result<DbHandle, PersistenceError>> {
        let result = if self.closed.load(Ordering::SeqCst) {
            Err(PersistenceError::Closed)
        } else {
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            Ok(DbHandle::new(Arc::clone(&self.store)))
        };
        future::ready(result).boxed()
    }

    fn release(&self, handle: DbHandle) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(handle = handle.id(), "recipes store handle released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ingredient, Unit};

    fn recipe(title: &str, ingredients: &[&str]) -> RecipeCreate {
        RecipeCreate {
            title: title.to_string(),
            description: None,
            ingredients: ingredients
                .iter()
                .map(|name| Ingredient {
                    name: (*name).to_string(),
                    qty: 1.0,
                    unit: Unit::Piece,
                })
                .collect(),
            steps: None,
        }
    }

    fn seeded() -> RecipeStore {
        let store = RecipeStore::new();
        store.create(recipe("Tomato Soup", &["tomato", "salt"])).unwrap();
        store.create(recipe("Apple Pie", &["Apple", "flour"])).unwrap();
        store.create(recipe("Tomato Salad", &["tomato", "basil"])).unwrap();
        store
    }

    fn page(limit: usize) -> ListQuery {
        ListQuery {
            limit,
            ..ListQuery::default()
        }
    }

    #[test]
    fn test_duplicate_title_is_case_insensitive() {
        let store = seeded();
        let err = store.create(recipe("  tomato soup", &["water"])).unwrap_err();
        assert_eq!(err, StoreError::DuplicateTitle("  tomato soup".to_string()));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_list_filters() {
        let store = seeded();

        let (total, data) = store.list(&ListQuery {
            search: Some("TOMATO".to_string()),
            ..page(20)
        });
        assert_eq!(total, 2);
        assert_eq!(data[0].title, "Tomato Soup");

        let (total, data) = store.list(&ListQuery {
            ingredient: Some(" apple ".to_string()),
            ..page(20)
        });
        assert_eq!(total, 1);
        assert_eq!(data[0].title, "Apple Pie");
    }

    #[test]
    fn test_list_sort_and_paginate() {
        let store = seeded();
        let (total, data) = store.list(&ListQuery {
            offset: 1,
            sort: Some("title:asc".parse().unwrap()),
            ..page(1)
        });
        assert_eq!(total, 3);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].title, "Tomato Salad");
    }

    #[test]
    fn test_update_and_delete() {
        let store = seeded();
        let (_, all) = store.list(&page(20));
        let soup = all[0].id;

        let clash = store.update(
            soup,
            RecipeUpdate {
                title: Some("apple pie".to_string()),
                ..RecipeUpdate::default()
            },
        );
        assert!(matches!(clash, Err(StoreError::DuplicateTitle(_))));

        let updated = store
            .update(
                soup,
                RecipeUpdate {
                    title: Some("Gazpacho".to_string()),
                    ..RecipeUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.normalized_title, "gazpacho");
        assert!(updated.updated_at >= updated.created_at);

        store.delete(soup).unwrap();
        assert_eq!(store.get(soup), Err(StoreError::NotFound(soup)));
        assert_eq!(store.delete(soup), Err(StoreError::NotFound(soup)));
    }

    #[test]
    fn test_store_errors_map_to_domain_statuses() {
        let err: MeshError = StoreError::NotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "RECIPE_NOT_FOUND");

        let err: MeshError = StoreError::DuplicateTitle("Soup".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_hands_out_the_store() {
        let persistence = InMemoryPersistence::new(Arc::new(seeded()));

        let handle = tokio_test::block_on(persistence.acquire()).unwrap();
        assert_eq!(persistence.outstanding(), 1);
        assert_eq!(handle.connection::<RecipeStore>().unwrap().len(), 3);

        persistence.release(handle);
        assert_eq!(persistence.outstanding(), 0);

        persistence.close();
        assert!(matches!(
            tokio_test::block_on(persistence.acquire()),
            Err(PersistenceError::Closed)
        ));
    }
}

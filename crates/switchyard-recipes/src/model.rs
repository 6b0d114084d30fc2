//! Recipe payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::{MeshError, MeshResult};
use uuid::Uuid;

/// Unit of measurement for an ingredient quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Grams.
    #[serde(rename = "g")]
    Gram,
    /// Kilograms.
    #[serde(rename = "kg")]
    Kilogram,
    /// Millilitres.
    #[serde(rename = "ml")]
    Milliliter,
    /// Litres.
    #[serde(rename = "l")]
    Liter,
    /// Teaspoons.
    #[serde(rename = "tsp")]
    Teaspoon,
    /// Tablespoons.
    #[serde(rename = "tbsp")]
    Tablespoon,
    /// Whole pieces.
    #[serde(rename = "pc")]
    Piece,
    /// A pinch.
    #[serde(rename = "pinch")]
    Pinch,
    /// A dash.
    #[serde(rename = "dash")]
    Dash,
}

/// One ingredient line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name.
    pub name: String,
    /// Quantity, strictly positive.
    pub qty: f64,
    /// Unit of `qty`.
    pub unit: Unit,
}

/// Body of `POST /recipes`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeCreate {
    /// Display title.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ingredient lines.
    pub ingredients: Vec<Ingredient>,
    /// Preparation steps.
    #[serde(default)]
    pub steps: Option<Vec<String>>,
}

impl RecipeCreate {
    /// Checks what the body schema cannot express.
    pub fn validate(&self) -> MeshResult<()> {
        validate_ingredients(&self.ingredients)
    }
}

/// Body of `PUT /recipes/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeUpdate {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// Replacement ingredient list.
    #[serde(default)]
    pub ingredients: Option<Vec<Ingredient>>,
    /// Replacement steps.
    #[serde(default)]
    pub steps: Option<Vec<String>>,
}

impl RecipeUpdate {
    /// Checks what the body schema cannot express.
    pub fn validate(&self) -> MeshResult<()> {
        self.ingredients
            .as_deref()
            .map_or(Ok(()), validate_ingredients)
    }
}

fn validate_ingredients(ingredients: &[Ingredient]) -> MeshResult<()> {
    for (idx, ingredient) in ingredients.iter().enumerate() {
        if !(ingredient.qty.is_finite() && ingredient.qty > 0.0) {
            return Err(MeshError::unprocessable(
                "quantity must be greater than zero",
                format!("$.ingredients[{idx}].qty"),
            ));
        }
    }
    Ok(())
}

/// A stored recipe as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeOut {
    /// Recipe id.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Lowercased, trimmed title. Unique across recipes.
    pub normalized_title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Ingredient lines.
    pub ingredients: Vec<Ingredient>,
    /// Preparation steps.
    pub steps: Option<Vec<String>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// One page of `GET /recipes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeListResponse {
    /// Matches before pagination.
    pub total: usize,
    /// Page size used.
    pub limit: usize,
    /// Offset used.
    pub offset: usize,
    /// The page.
    pub data: Vec<RecipeOut>,
}

/// Body of a successful delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Always `true`.
    pub success: bool,
}

/// Normalizes a title for uniqueness checks and search.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Field a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Display title.
    Title,
    /// Normalized title.
    NormalizedTitle,
    /// Creation time.
    CreatedAt,
    /// Last modification time.
    UpdatedAt,
}

/// A `field:asc` / `field:desc` sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// Field to sort by.
    pub field: SortField,
    /// Descending when true.
    pub descending: bool,
}

/// The sort value did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSort(pub String);

impl fmt::Display for InvalidSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sort value '{}': use field:asc or field:desc", self.0)
    }
}

impl std::error::Error for InvalidSort {}

impl FromStr for SortOrder {
    type Err = InvalidSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSort(s.to_string());
        let (field, direction) = s.split_once(':').ok_or_else(invalid)?;

        let field = match field {
            "title" => SortField::Title,
            "normalized_title" => SortField::NormalizedTitle,
            "created_at" => SortField::CreatedAt,
            "updated_at" => SortField::UpdatedAt,
            _ => return Err(invalid()),
        };
        let descending = match direction.to_ascii_lowercase().as_str() {
            "asc" => false,
            "desc" => true,
            _ => return Err(invalid()),
        };

        Ok(Self { field, descending })
    }
}

//! Category API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{after_write, error, success, ApiResult};
use crate::models::{Category, CategoryFields, CategoryPatch};
use crate::store::EntityKind;
use crate::AppState;

/// GET /api/categories - List all categories.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_categories().await {
        Ok(categories) => success(categories, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/categories - Create a category.
pub async fn create_category(
    State(state): State<AppState>,
    Json(fields): Json<CategoryFields>,
) -> ApiResult<Category> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.create_category(&fields).await;
    after_write(&state, result, revision_id).await
}

/// PUT /api/categories/{id} - Update a category.
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CategoryPatch>,
) -> ApiResult<Category> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.update_category(&id, &patch).await;
    after_write(&state, result, revision_id).await
}

/// DELETE /api/categories/{id} - Delete a category no topic is constrained by.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.delete(EntityKind::Category, &id).await;
    after_write(&state, result, revision_id).await
}

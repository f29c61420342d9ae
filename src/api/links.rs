//! Link set API endpoints.

use axum::extract::{Path, State};

use super::{after_write, error, success, ApiResult};
use crate::errors::AppError;
use crate::models::Id;
use crate::store::LinkSet;
use crate::AppState;

fn parse_set(raw: &str) -> Result<LinkSet, AppError> {
    LinkSet::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown link set: {}", raw)))
}

/// GET /api/links/{set}/{parent} - Child ids linked to a parent.
pub async fn list_links(
    State(state): State<AppState>,
    Path((set, parent)): Path<(String, String)>,
) -> ApiResult<Vec<Id>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let set = match parse_set(&set) {
        Ok(set) => set,
        Err(e) => return error(e, revision_id),
    };
    match state.repo.list_links(set, &parent).await {
        Ok(children) => success(children, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/links/{set}/{parent}/{child} - Link a child. Idempotent.
pub async fn put_link(
    State(state): State<AppState>,
    Path((set, parent, child)): Path<(String, String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let set = match parse_set(&set) {
        Ok(set) => set,
        Err(e) => return error(e, revision_id),
    };
    let result = state.repo.link(set, &parent, &child).await;
    after_write(&state, result, revision_id).await
}

/// DELETE /api/links/{set}/{parent}/{child} - Unlink a child. Idempotent.
pub async fn delete_link(
    State(state): State<AppState>,
    Path((set, parent, child)): Path<(String, String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let set = match parse_set(&set) {
        Ok(set) => set,
        Err(e) => return error(e, revision_id),
    };
    let result = state.repo.unlink(set, &parent, &child).await;
    after_write(&state, result, revision_id).await
}

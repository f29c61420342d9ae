//! Period API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{after_write, error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Assignment, Period, PeriodFields, PeriodPatch};
use crate::store::EntityKind;
use crate::AppState;

/// GET /api/periods - List all periods.
pub async fn list_periods(State(state): State<AppState>) -> ApiResult<Vec<Period>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_periods().await {
        Ok(periods) => success(periods, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/periods - Create a period (inactive).
pub async fn create_period(
    State(state): State<AppState>,
    Json(fields): Json<PeriodFields>,
) -> ApiResult<Period> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.create_period(&fields).await;
    after_write(&state, result, revision_id).await
}

/// PUT /api/periods/{id} - Update a period.
pub async fn update_period(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<PeriodPatch>,
) -> ApiResult<Period> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.update_period(&id, &patch).await;
    after_write(&state, result, revision_id).await
}

/// DELETE /api/periods/{id} - Delete a period without links or assignments.
pub async fn delete_period(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.delete(EntityKind::Period, &id).await;
    after_write(&state, result, revision_id).await
}

/// POST /api/periods/{id}/activate - Make the period the open one.
pub async fn activate_period(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Period> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = state.repo.set_active_period(&id).await {
        return error(e, revision_id);
    }
    let result = match state.repo.get_period(&id).await {
        Ok(Some(period)) => Ok(period),
        Ok(None) => Err(AppError::NotFound(format!("Period {} not found", id))),
        Err(e) => Err(e),
    };
    after_write(&state, result, revision_id).await
}

/// GET /api/periods/{id}/assignments - Matching results of a period.
pub async fn list_assignments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Assignment>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_assignments(&id).await {
        Ok(assignments) => success(assignments, revision_id),
        Err(e) => error(e, revision_id),
    }
}

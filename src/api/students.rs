//! Student API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{after_write, error, success, ApiResult};
use crate::models::{Student, StudentFields};
use crate::store::EntityKind;
use crate::AppState;

/// GET /api/students - List all students.
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Vec<Student>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_students().await {
        Ok(students) => success(students, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/students - Register a student.
pub async fn create_student(
    State(state): State<AppState>,
    Json(fields): Json<StudentFields>,
) -> ApiResult<Student> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.create_student(&fields).await;
    after_write(&state, result, revision_id).await
}

/// DELETE /api/students/{id} - Delete a student without assignments.
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.delete(EntityKind::Student, &id).await;
    after_write(&state, result, revision_id).await
}

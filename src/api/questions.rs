//! Question API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{after_write, error, success, ApiResult};
use crate::models::{Question, QuestionFields, QuestionPatch};
use crate::store::EntityKind;
use crate::AppState;

/// GET /api/questions - List all questions.
pub async fn list_questions(State(state): State<AppState>) -> ApiResult<Vec<Question>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_questions().await {
        Ok(questions) => success(questions, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/questions - Create a question.
pub async fn create_question(
    State(state): State<AppState>,
    Json(fields): Json<QuestionFields>,
) -> ApiResult<Question> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.create_question(&fields).await;
    after_write(&state, result, revision_id).await
}

/// PUT /api/questions/{id} - Update a question.
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<QuestionPatch>,
) -> ApiResult<Question> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.update_question(&id, &patch).await;
    after_write(&state, result, revision_id).await
}

/// DELETE /api/questions/{id} - Delete a question no period uses.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.delete(EntityKind::Question, &id).await;
    after_write(&state, result, revision_id).await
}

//! Topic API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{after_write, error, success, ApiResult};
use crate::models::{Topic, TopicFields, TopicPatch};
use crate::store::EntityKind;
use crate::AppState;

/// GET /api/topics - List all topics.
pub async fn list_topics(State(state): State<AppState>) -> ApiResult<Vec<Topic>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_topics().await {
        Ok(topics) => success(topics, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/topics - Create a new topic.
pub async fn create_topic(
    State(state): State<AppState>,
    Json(fields): Json<TopicFields>,
) -> ApiResult<Topic> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.create_topic(&fields).await;
    after_write(&state, result, revision_id).await
}

/// PUT /api/topics/{id} - Update a topic.
pub async fn update_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TopicPatch>,
) -> ApiResult<Topic> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.update_topic(&id, &patch).await;
    after_write(&state, result, revision_id).await
}

/// DELETE /api/topics/{id} - Delete a topic. Its allow-list goes with it.
pub async fn delete_topic(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let result = state.repo.delete(EntityKind::Topic, &id).await;
    after_write(&state, result, revision_id).await
}

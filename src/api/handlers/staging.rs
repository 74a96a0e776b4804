use crate::AppState;
use crate::api::error::AppError;
use crate::services::attachment_store::PersistedAttachment;
use crate::services::staging::StagedItem;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CommitRequest {
    #[validate(range(min = 1, message = "Record id must be positive"))]
    pub record_id: i32,
    /// Drop the whole session once the field is persisted
    #[serde(default)]
    pub discard: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommitResponse {
    pub field_name: String,
    pub attachments: Vec<PersistedAttachment>,
    pub discarded: bool,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RehydrateRequest {
    #[validate(range(min = 1, message = "Record id must be positive"))]
    pub record_id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RehydrateResponse {
    pub session_id: String,
    pub restaged: usize,
}

#[utoipa::path(
    get,
    path = "/sessions/{session_id}/fields/{field_name}",
    params(
        ("session_id" = String, Path, description = "Staging session identifier"),
        ("field_name" = String, Path, description = "Field identifier, e.g. entry_12")
    ),
    responses(
        (status = 200, description = "Staged files of the field, in upload order", body = Vec<StagedItem>)
    ),
    tag = "staging"
)]
pub async fn list_staged(
    State(state): State<AppState>,
    Path((session_id, field_name)): Path<(String, String)>,
) -> Json<Vec<StagedItem>> {
    Json(state.staging.staged_items(&session_id, &field_name).await)
}

#[utoipa::path(
    delete,
    path = "/sessions/{session_id}/fields/{field_name}/{index}",
    params(
        ("session_id" = String, Path, description = "Staging session identifier"),
        ("field_name" = String, Path, description = "Field identifier"),
        ("index" = usize, Path, description = "Zero-based position of the staged file")
    ),
    responses(
        (status = 200, description = "Remaining staged files", body = Vec<StagedItem>)
    ),
    tag = "staging"
)]
pub async fn remove_staged(
    State(state): State<AppState>,
    Path((session_id, field_name, index)): Path<(String, String, usize)>,
) -> Json<Vec<StagedItem>> {
    state
        .staging
        .remove_staged(&session_id, &field_name, index)
        .await;
    Json(state.staging.staged_items(&session_id, &field_name).await)
}

#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(
        ("session_id" = String, Path, description = "Staging session identifier")
    ),
    responses(
        (status = 204, description = "Session discarded, or it did not exist")
    ),
    tag = "staging"
)]
pub async fn discard_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    state.staging.discard_session(&session_id);
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    post,
    path = "/sessions/{session_id}/fields/{field_name}/commit",
    request_body = CommitRequest,
    params(
        ("session_id" = String, Path, description = "Staging session identifier"),
        ("field_name" = String, Path, description = "Field identifier")
    ),
    responses(
        (status = 200, description = "Staged files persisted", body = CommitResponse),
        (status = 400, description = "Invalid record id"),
        (status = 404, description = "Unknown field")
    ),
    tag = "staging"
)]
pub async fn commit_field(
    State(state): State<AppState>,
    Path((session_id, field_name)): Path<(String, String)>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let attachments = state
        .staging
        .commit_field(&session_id, &field_name, req.record_id, state.store.as_ref())
        .await?;

    let discarded = req.discard && state.staging.discard_session(&session_id);

    Ok(Json(CommitResponse {
        field_name,
        attachments,
        discarded,
    }))
}

#[utoipa::path(
    post,
    path = "/sessions/{session_id}/rehydrate",
    request_body = RehydrateRequest,
    params(
        ("session_id" = String, Path, description = "Staging session identifier")
    ),
    responses(
        (status = 200, description = "Session rebuilt from the record's attachments", body = RehydrateResponse),
        (status = 400, description = "Invalid record id")
    ),
    tag = "staging"
)]
pub async fn rehydrate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<RehydrateRequest>,
) -> Result<Json<RehydrateResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let persisted = state.store.list_for_record(req.record_id).await?;
    let restaged = state
        .staging
        .rehydrate(
            &session_id,
            &persisted,
            state.store.as_ref(),
            state.blob_store.as_deref(),
        )
        .await?;

    Ok(Json(RehydrateResponse {
        session_id,
        restaged,
    }))
}

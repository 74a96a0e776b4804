use crate::AppState;
use crate::api::error::AppError;
use crate::services::entry_parameter_service::{EntryParameterService, ReferenceItem};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateParameterRequest {
    #[validate(length(min = 1, max = 255))]
    pub value: String,
}

#[utoipa::path(
    get,
    path = "/parameters",
    responses(
        (status = 200, description = "All entry parameters", body = Vec<ReferenceItem>)
    ),
    tag = "parameters"
)]
pub async fn list_parameters(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReferenceItem>>, AppError> {
    Ok(Json(EntryParameterService::find_all(&state.db).await?))
}

#[utoipa::path(
    get,
    path = "/parameters/{key}",
    params(
        ("key" = String, Path, description = "Parameter key")
    ),
    responses(
        (status = 200, description = "Entry parameter", body = ReferenceItem),
        (status = 404, description = "Unknown parameter")
    ),
    tag = "parameters"
)]
pub async fn get_parameter(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ReferenceItem>, AppError> {
    EntryParameterService::find_by_key(&state.db, &key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Unknown parameter: {}", key)))
}

#[utoipa::path(
    put,
    path = "/parameters/{key}",
    request_body = UpdateParameterRequest,
    params(
        ("key" = String, Path, description = "Parameter key")
    ),
    responses(
        (status = 200, description = "Parameter updated", body = ReferenceItem),
        (status = 404, description = "Unknown parameter")
    ),
    tag = "parameters"
)]
pub async fn update_parameter(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateParameterRequest>,
) -> Result<Json<ReferenceItem>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if EntryParameterService::find_by_key(&state.db, &key)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("Unknown parameter: {}", key)));
    }

    let updated = EntryParameterService::update(
        &state.db,
        ReferenceItem {
            code: key,
            name: req.value,
        },
    )
    .await?;

    Ok(Json(updated))
}

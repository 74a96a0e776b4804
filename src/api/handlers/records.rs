use crate::AppState;
use crate::api::error::AppError;
use crate::services::staging::parse_field_name;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct RemovedAttachments {
    pub record_id: i32,
    pub field_name: String,
    pub removed: usize,
}

/// Deletes every attachment of one field of a record, thumbnails included,
/// along with their stored bytes or remote blobs.
#[utoipa::path(
    delete,
    path = "/records/{record_id}/fields/{field_name}",
    params(
        ("record_id" = i32, Path, description = "Record identifier"),
        ("field_name" = String, Path, description = "Field identifier, e.g. entry_3")
    ),
    responses(
        (status = 200, description = "Attachments removed", body = RemovedAttachments),
        (status = 404, description = "Unknown field")
    ),
    tag = "records"
)]
pub async fn remove_record_field(
    State(state): State<AppState>,
    Path((record_id, field_name)): Path<(i32, String)>,
) -> Result<Json<RemovedAttachments>, AppError> {
    let entry_id = parse_field_name(&field_name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown field: {}", field_name)))?;

    let attachments = state.store.list_for_record(record_id).await?;
    let mut removed = 0;
    for attachment in attachments.iter().filter(|a| a.entry_id == entry_id) {
        state.store.remove(attachment).await?;
        removed += 1;
    }

    Ok(Json(RemovedAttachments {
        record_id,
        field_name,
        removed,
    }))
}

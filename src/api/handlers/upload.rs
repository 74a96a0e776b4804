use crate::AppState;
use crate::api::error::AppError;
use crate::services::staging::{StagedUpload, UploadForm, UploadOutcome};
use crate::utils::i18n::Locale;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, header::ACCEPT_LANGUAGE},
};
use serde::Serialize;
use utoipa::ToSchema;

pub const SESSION_PARAM: &str = "jsessionid";
pub const FIELD_NAME_PARAM: &str = "field_name";

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Field the pressed button acted upon, absent when no button was pressed
    pub field_name: Option<String>,
}

/// Text parameters and file parts of a multipart body, in posting order.
#[derive(Debug, Default)]
struct MultipartBody {
    params: Vec<(String, String)>,
    files: Vec<(String, StagedUpload)>,
}

impl MultipartBody {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub(crate) fn request_locale(headers: &HeaderMap, fallback: Locale) -> Locale {
    let header = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
    Locale::from_accept_language(header, fallback)
}

async fn read_multipart(mut multipart: Multipart) -> Result<MultipartBody, AppError> {
    let mut body = MultipartBody::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content = field.bytes().await?;
                if file_name.trim().is_empty() && content.is_empty() {
                    // Browsers post an empty part for an untouched file input
                    continue;
                }
                body.files.push((name, StagedUpload::new(&file_name, content)));
            }
            None => {
                let value = field.text().await?;
                body.params.push((name, value));
            }
        }
    }

    Ok(body)
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = String, description = "jsessionid, field_name and one or more file parts", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Upload processed; success tells whether the files were staged", body = UploadOutcome),
        (status = 400, description = "No file or no field name provided"),
        (status = 413, description = "Request body too large")
    ),
    tag = "staging"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadOutcome>, AppError> {
    let locale = request_locale(&headers, state.config.default_locale);
    let mut body = read_multipart(multipart).await?;

    let uploads: Vec<StagedUpload> = std::mem::take(&mut body.files)
        .into_iter()
        .map(|(_, upload)| upload)
        .collect();

    let outcome = state
        .staging
        .process(
            body.param(SESSION_PARAM),
            body.param(FIELD_NAME_PARAM),
            uploads,
            locale,
        )
        .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/sessions/{session_id}/actions",
    request_body(content = String, description = "Form holding an upload or delete button", content_type = "multipart/form-data"),
    params(
        ("session_id" = String, Path, description = "Staging session identifier")
    ),
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 400, description = "Files rejected by the field policy"),
        (status = 404, description = "Unknown field")
    ),
    tag = "staging"
)]
pub async fn upload_action(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ActionResponse>, AppError> {
    let locale = request_locale(&headers, state.config.default_locale);
    let body = read_multipart(multipart).await?;

    let form = UploadForm {
        params: body.params.into_iter().map(|(name, _)| name).collect(),
        files: body.files,
    };

    let field_name = state
        .staging
        .do_upload_action(&session_id, &form, locale)
        .await?;

    Ok(Json(ActionResponse { field_name }))
}

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::actions::{UploadAction, checked_indexes};
use super::error::StagingError;
use super::registry::StagingRegistry;
use super::types::{FIELD_NAME_PREFIX, FieldKey, StagedItem, StagedUpload, field_name_for, parse_field_name};
use crate::services::attachment_store::{AttachmentStore, PersistedAttachment};
use crate::services::blob_store::BlobStoreClient;
use crate::services::entry_catalog::{Entry, EntryCatalog, FieldKind};
use crate::utils::i18n::{Locale, Message, localize};

/// JSON answer of the asynchronous upload endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<StagedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadOutcome {
    fn admitted(field_name: &str, items: Vec<StagedItem>) -> Self {
        Self {
            success: true,
            field_name: Some(field_name.to_string()),
            items,
            message: None,
        }
    }

    fn rejected(field_name: Option<&str>, message: Option<String>) -> Self {
        Self {
            success: false,
            field_name: field_name.map(str::to_string),
            items: Vec::new(),
            message,
        }
    }
}

/// A posted form: the names of its plain parameters and its file parts.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub params: Vec<String>,
    pub files: Vec<(String, StagedUpload)>,
}

impl UploadForm {
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(String::as_str)
    }

    pub fn files_for(&self, field_name: &str) -> Vec<StagedUpload> {
        self.files
            .iter()
            .filter(|(name, upload)| name == field_name && !upload.name().trim().is_empty())
            .map(|(_, upload)| upload.clone())
            .collect()
    }
}

/// Holds uploads per session and field until the owning form is submitted.
pub struct UploadStagingService {
    registry: StagingRegistry,
    catalog: Arc<dyn EntryCatalog>,
}

impl UploadStagingService {
    pub fn new(registry: StagingRegistry, catalog: Arc<dyn EntryCatalog>) -> Self {
        Self { registry, catalog }
    }

    pub fn registry(&self) -> &StagingRegistry {
        &self.registry
    }

    pub fn ensure_session(&self, session_id: &str, field_name: &str) {
        self.registry
            .ensure_session(&FieldKey::new(session_id, field_name));
    }

    async fn resolve_entry(&self, field_name: &str) -> Result<Entry, StagingError> {
        let entry_id = parse_field_name(field_name)
            .ok_or_else(|| StagingError::UnknownField(field_name.to_string()))?;
        self.catalog
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| StagingError::UnknownField(field_name.to_string()))
    }

    /// Locks the field list the registry currently holds for `key`, creating
    /// it if needed. A list swapped out by a concurrent discard, rehydration
    /// or sweep while waiting for the lock is dropped and looked up again.
    async fn lock_live_field(&self, key: &FieldKey) -> OwnedMutexGuard<Vec<StagedUpload>> {
        loop {
            let list = self.registry.ensure_session(key);
            let guard = list.clone().lock_owned().await;
            if self
                .registry
                .field(key)
                .is_some_and(|live| Arc::ptr_eq(&live, &list))
            {
                return guard;
            }
            debug!("Staging area of {} was replaced, retrying", key);
        }
    }

    /// Validates the batch against the field policy and appends it as a whole.
    /// Nothing is staged when the policy rejects the batch.
    pub async fn stage_uploads(
        &self,
        session_id: &str,
        field_name: &str,
        new_items: Vec<StagedUpload>,
        locale: Locale,
    ) -> Result<usize, StagingError> {
        if new_items.is_empty() {
            return Err(StagingError::EmptyUpload);
        }

        let entry = self.resolve_entry(field_name).await?;
        let key = FieldKey::new(session_id, field_name);

        let mut staged = self.lock_live_field(&key).await;
        if let Err(e) = entry
            .validator()
            .can_upload_files(&staged, &new_items, locale)
        {
            debug!("Upload rejected for {}: {}", key, e);
            return Err(e.into());
        }

        for item in &new_items {
            if staged.iter().any(|s| s.looks_like(item)) {
                warn!("'{}' seems to be staged already for {}", item.name(), key);
            }
        }

        let admitted = new_items.len();
        staged.extend(new_items);
        info!(
            "Staged {} file(s) for {} ({} in total)",
            admitted,
            key,
            staged.len()
        );
        Ok(admitted)
    }

    /// Entry point of the asynchronous upload widget.
    ///
    /// Policy rejections, unknown fields and a missing session are answered
    /// with an unsuccessful outcome; an empty batch or a missing field name
    /// means the caller sent a malformed request.
    pub async fn process(
        &self,
        session_id: Option<&str>,
        field_name: Option<&str>,
        new_items: Vec<StagedUpload>,
        locale: Locale,
    ) -> Result<UploadOutcome, StagingError> {
        if new_items.is_empty() {
            return Err(StagingError::EmptyUpload);
        }

        let Some(session_id) = session_id.filter(|s| !s.trim().is_empty()) else {
            error!("Upload received without a session identifier");
            return Ok(UploadOutcome::rejected(
                None,
                Some(localize(&Message::SessionLost, locale)),
            ));
        };

        let field_name = field_name
            .filter(|f| !f.trim().is_empty())
            .ok_or(StagingError::MissingField)?;

        match self
            .stage_uploads(session_id, field_name, new_items, locale)
            .await
        {
            Ok(_) => {
                let items = self.staged_items(session_id, field_name).await;
                Ok(UploadOutcome::admitted(field_name, items))
            }
            Err(StagingError::Validation(e)) => {
                Ok(UploadOutcome::rejected(Some(field_name), Some(e.message)))
            }
            Err(StagingError::UnknownField(field)) => {
                debug!("Ignoring upload for unknown field {}", field);
                Ok(UploadOutcome::rejected(Some(field_name), None))
            }
            Err(e) => Err(e),
        }
    }

    /// Applies the upload or delete button pressed on a plain form.
    /// Returns the field acted upon, or `None` when no button was pressed.
    pub async fn do_upload_action(
        &self,
        session_id: &str,
        form: &UploadForm,
        locale: Locale,
    ) -> Result<Option<String>, StagingError> {
        let Some(action) = UploadAction::find(form.param_names()) else {
            return Ok(None);
        };
        let field_name = format!("{}{}", FIELD_NAME_PREFIX, action.entry_id());

        match action {
            UploadAction::Submit { .. } => {
                let files = form.files_for(&field_name);
                if files.is_empty() {
                    return Ok(Some(field_name));
                }
                match self
                    .stage_uploads(session_id, &field_name, files, locale)
                    .await
                {
                    Ok(_) => {}
                    Err(StagingError::UnknownField(field)) => {
                        debug!("Ignoring upload for unknown field {}", field);
                    }
                    Err(e) => return Err(e),
                }
            }
            UploadAction::Delete { ref entry_id } => {
                for index in checked_indexes(form.param_names(), entry_id) {
                    self.remove_staged(session_id, &field_name, index).await;
                }
            }
        }

        Ok(Some(field_name))
    }

    pub async fn staged_uploads(&self, session_id: &str, field_name: &str) -> Vec<StagedUpload> {
        match self.registry.field(&FieldKey::new(session_id, field_name)) {
            Some(list) => list.lock().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn staged_items(&self, session_id: &str, field_name: &str) -> Vec<StagedItem> {
        StagedItem::list(&self.staged_uploads(session_id, field_name).await)
    }

    /// Drops the staged file at `index`. Out-of-range positions are ignored.
    pub async fn remove_staged(&self, session_id: &str, field_name: &str, index: usize) -> bool {
        let key = FieldKey::new(session_id, field_name);
        let Some(list) = self.registry.field(&key) else {
            return false;
        };

        let mut staged = list.lock().await;
        if index >= staged.len() {
            debug!("No staged file at position {} for {}", index, key);
            return false;
        }

        let removed = staged.remove(index);
        info!("Removed staged file '{}' from {}", removed.name(), key);
        true
    }

    pub fn discard_session(&self, session_id: &str) -> bool {
        let discarded = self.registry.discard(session_id);
        if discarded {
            info!("Discarded staged files of session {}", session_id);
        }
        discarded
    }

    /// Persists every staged file of a field, in order, against `record_id`.
    /// The staging area is left untouched.
    pub async fn commit_field(
        &self,
        session_id: &str,
        field_name: &str,
        record_id: i32,
        store: &dyn AttachmentStore,
    ) -> Result<Vec<PersistedAttachment>, StagingError> {
        let entry = self.resolve_entry(field_name).await?;
        let uploads = self.staged_uploads(session_id, field_name).await;

        let mut persisted = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            persisted.push(store.store(record_id, &entry, upload).await?);
        }

        info!(
            "Committed {} file(s) of {}/{} to record {}",
            persisted.len(),
            session_id,
            field_name,
            record_id
        );
        Ok(persisted)
    }

    /// Rebuilds the staging area of a session from a record's attachments,
    /// replacing whatever the session held before. Thumbnails are skipped.
    /// An attachment whose bytes cannot be read is logged and skipped; the
    /// others are still restaged.
    pub async fn rehydrate(
        &self,
        session_id: &str,
        persisted: &[PersistedAttachment],
        store: &dyn AttachmentStore,
        blob_store: Option<&dyn BlobStoreClient>,
    ) -> Result<usize, StagingError> {
        self.registry.discard(session_id);

        let mut restaged = 0;
        for attachment in persisted {
            if attachment.is_thumbnail() {
                continue;
            }

            let Some(upload) = self.load_attachment(session_id, attachment, store, blob_store).await
            else {
                continue;
            };

            let key = FieldKey::new(session_id, field_name_for(attachment.entry_id));
            self.lock_live_field(&key).await.push(upload);
            restaged += 1;
        }

        info!(
            "Rehydrated {} file(s) into session {}",
            restaged, session_id
        );
        Ok(restaged)
    }

    async fn load_attachment(
        &self,
        session_id: &str,
        attachment: &PersistedAttachment,
        store: &dyn AttachmentStore,
        blob_store: Option<&dyn BlobStoreClient>,
    ) -> Option<StagedUpload> {
        let stored_name = attachment.file.as_ref().map(|f| f.title.as_str());

        match (attachment.field_kind, &attachment.value) {
            (FieldKind::ExternalReference, Some(url)) => {
                let Some(blob_store) = blob_store else {
                    debug!("No blob store configured, skipping {}", url);
                    return None;
                };
                match blob_store.fetch(url).await {
                    Ok(remote) => Some(StagedUpload::new(
                        stored_name.unwrap_or(remote.name.as_str()),
                        remote.content,
                    )),
                    Err(e) => {
                        error!("Error when restoring {} for session {}: {}", url, session_id, e);
                        None
                    }
                }
            }
            _ => {
                let name = stored_name?;
                match store.fetch_bytes(attachment).await {
                    Ok(content) => Some(StagedUpload::new(name, content)),
                    Err(e) => {
                        error!(
                            "Error when restoring record field {} for session {}: {}",
                            attachment.id, session_id, e
                        );
                        None
                    }
                }
            }
        }
    }
}

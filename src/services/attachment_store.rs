use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::entities::{prelude::*, record_fields};
use crate::services::blob_store::BlobStoreClient;
use crate::services::entry_catalog::{Entry, FieldKind};
use crate::services::file_repository::{FileRepository, NewFile};
use crate::services::staging::StagedUpload;

/// Preview images generated from an attachment. They are rebuilt, never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailVariant {
    #[default]
    None,
    Little,
    Big,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PersistedFile {
    pub id: i32,
    pub title: String,
    pub size: i64,
    pub mime_type: Option<String>,
}

/// A file attached to a record field once it has left the staging area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PersistedAttachment {
    pub id: i32,
    pub record_id: i32,
    pub entry_id: i32,
    pub field_kind: FieldKind,
    /// URL of the remote resource for external-reference fields
    pub value: Option<String>,
    pub file: Option<PersistedFile>,
    pub thumbnail: ThumbnailVariant,
}

impl PersistedAttachment {
    pub fn is_thumbnail(&self) -> bool {
        self.thumbnail != ThumbnailVariant::None
    }
}

/// Permanent storage for committed attachments.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn store(
        &self,
        record_id: i32,
        entry: &Entry,
        upload: &StagedUpload,
    ) -> Result<PersistedAttachment>;

    async fn fetch_bytes(&self, attachment: &PersistedAttachment) -> Result<Bytes>;

    async fn list_for_record(&self, record_id: i32) -> Result<Vec<PersistedAttachment>>;

    /// Deletes the attachment together with its file or remote blob.
    async fn remove(&self, attachment: &PersistedAttachment) -> Result<()>;
}

/// Keeps stored files in the database. External-reference files go to the
/// blob store and only their name, type and download URL are recorded.
pub struct DatabaseAttachmentStore {
    db: DatabaseConnection,
    blob_store: Option<Arc<dyn BlobStoreClient>>,
}

impl DatabaseAttachmentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            blob_store: None,
        }
    }

    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStoreClient>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    fn blob_store(&self) -> Result<&dyn BlobStoreClient> {
        self.blob_store
            .as_deref()
            .ok_or_else(|| anyhow!("No blob store configured for external-reference fields"))
    }
}

#[async_trait]
impl AttachmentStore for DatabaseAttachmentStore {
    async fn store(
        &self,
        record_id: i32,
        entry: &Entry,
        upload: &StagedUpload,
    ) -> Result<PersistedAttachment> {
        let (value, content) = match entry.kind {
            FieldKind::ExternalReference => {
                let url = self.blob_store()?.upload(upload).await?;
                (Some(url), None)
            }
            FieldKind::StoredFile | FieldKind::Other => (None, Some(upload.content().to_vec())),
        };

        let txn = self.db.begin().await?;

        let file = FileRepository::create(
            &txn,
            NewFile {
                title: upload.name().to_string(),
                size: upload.size() as i64,
                mime_type: Some(upload.content_type().to_string()),
                content,
            },
        )
        .await?;

        let field = record_fields::ActiveModel {
            id: NotSet,
            record_id: Set(record_id),
            entry_id: Set(entry.id),
            value: Set(value.clone()),
            file_id: Set(Some(file.id)),
            is_little_thumbnail: Set(false),
            is_big_thumbnail: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        tracing::info!(
            "Stored '{}' ({} bytes) as record field {} of record {}",
            upload.name(),
            upload.size(),
            field.id,
            record_id
        );

        Ok(PersistedAttachment {
            id: field.id,
            record_id,
            entry_id: entry.id,
            field_kind: entry.kind,
            value,
            file: Some(PersistedFile {
                id: file.id,
                title: file.title,
                size: file.size,
                mime_type: file.mime_type,
            }),
            thumbnail: ThumbnailVariant::None,
        })
    }

    async fn fetch_bytes(&self, attachment: &PersistedAttachment) -> Result<Bytes> {
        if let (FieldKind::ExternalReference, Some(url)) = (attachment.field_kind, &attachment.value) {
            return Ok(self.blob_store()?.fetch(url).await?.content);
        }

        let file_ref = attachment
            .file
            .as_ref()
            .ok_or_else(|| anyhow!("Record field {} has no file", attachment.id))?;

        let file = FileRepository::find_by_primary_key(&self.db, file_ref.id)
            .await?
            .ok_or_else(|| anyhow!("File not found: {}", file_ref.id))?;

        let content = FileRepository::load_content(&self.db, &file)
            .await?
            .ok_or_else(|| anyhow!("File {} has no physical content", file.id))?;

        Ok(Bytes::from(content))
    }

    async fn list_for_record(&self, record_id: i32) -> Result<Vec<PersistedAttachment>> {
        let fields = RecordFields::find()
            .filter(record_fields::Column::RecordId.eq(record_id))
            .order_by_asc(record_fields::Column::Id)
            .all(&self.db)
            .await?;

        let mut attachments = Vec::with_capacity(fields.len());
        for field in fields {
            let field_kind = Entries::find_by_id(field.entry_id)
                .one(&self.db)
                .await?
                .map(|e| Entry::from(e).kind)
                .unwrap_or(FieldKind::Other);

            let file = match field.file_id {
                Some(file_id) => FileRepository::find_by_primary_key(&self.db, file_id)
                    .await?
                    .map(|f| PersistedFile {
                        id: f.id,
                        title: f.title,
                        size: f.size,
                        mime_type: f.mime_type,
                    }),
                None => None,
            };

            let thumbnail = if field.is_little_thumbnail {
                ThumbnailVariant::Little
            } else if field.is_big_thumbnail {
                ThumbnailVariant::Big
            } else {
                ThumbnailVariant::None
            };

            attachments.push(PersistedAttachment {
                id: field.id,
                record_id: field.record_id,
                entry_id: field.entry_id,
                field_kind,
                value: field.value,
                file,
                thumbnail,
            });
        }

        Ok(attachments)
    }

    async fn remove(&self, attachment: &PersistedAttachment) -> Result<()> {
        if let (FieldKind::ExternalReference, Some(url)) = (attachment.field_kind, &attachment.value) {
            self.blob_store()?.delete(url).await?;
        }

        let txn = self.db.begin().await?;
        RecordFields::delete_by_id(attachment.id).exec(&txn).await?;
        if let Some(file) = &attachment.file {
            FileRepository::remove(&txn, file.id).await?;
        }
        txn.commit().await?;

        tracing::info!(
            "Removed record field {} of record {}",
            attachment.id,
            attachment.record_id
        );
        Ok(())
    }
}

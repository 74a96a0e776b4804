use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::entities::{entries, prelude::*};
use crate::services::field_validator::{FieldValidator, RejectAllFiles, UploadPolicy};

/// What a field stores when a file is attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Bytes are kept in the physical file store.
    StoredFile,
    /// Only a URL is kept; the bytes live on a remote blob store.
    ExternalReference,
    Other,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::StoredFile => "stored_file",
            FieldKind::ExternalReference => "external_reference",
            FieldKind::Other => "other",
        }
    }
}

impl FromStr for FieldKind {
    type Err = std::convert::Infallible;

    /// Unknown tags map to `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "stored_file" => FieldKind::StoredFile,
            "external_reference" => FieldKind::ExternalReference,
            _ => FieldKind::Other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: i32,
    pub title: String,
    pub kind: FieldKind,
    pub policy: UploadPolicy,
}

impl Entry {
    pub fn new(id: i32, title: impl Into<String>, kind: FieldKind, policy: UploadPolicy) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
            policy,
        }
    }

    pub fn validator(&self) -> &dyn FieldValidator {
        match self.kind {
            FieldKind::StoredFile | FieldKind::ExternalReference => &self.policy,
            FieldKind::Other => &RejectAllFiles,
        }
    }
}

impl From<entries::Model> for Entry {
    fn from(model: entries::Model) -> Self {
        let allowed_mime_types = model
            .allowed_mime_types
            .as_deref()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let kind = model.kind.parse().unwrap_or(FieldKind::Other);

        Self {
            id: model.id,
            title: model.title,
            kind,
            policy: UploadPolicy {
                max_files: model.max_files.and_then(|m| u32::try_from(m).ok()),
                max_file_size: model.max_file_size.and_then(|m| u64::try_from(m).ok()),
                allowed_mime_types,
            },
        }
    }
}

/// Read access to form field definitions.
#[async_trait]
pub trait EntryCatalog: Send + Sync {
    async fn find_entry(&self, entry_id: i32) -> Result<Option<Entry>>;
}

pub struct DatabaseEntryCatalog {
    db: DatabaseConnection,
}

impl DatabaseEntryCatalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntryCatalog for DatabaseEntryCatalog {
    async fn find_entry(&self, entry_id: i32) -> Result<Option<Entry>> {
        let model = Entries::find_by_id(entry_id).one(&self.db).await?;
        Ok(model.map(Entry::from))
    }
}

#[derive(Default)]
pub struct InMemoryEntryCatalog {
    entries: DashMap<i32, Entry>,
}

impl InMemoryEntryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: Entry) {
        self.entries.insert(entry.id, entry);
    }
}

impl FromIterator<Entry> for InMemoryEntryCatalog {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        let catalog = Self::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}

#[async_trait]
impl EntryCatalog for InMemoryEntryCatalog {
    async fn find_entry(&self, entry_id: i32) -> Result<Option<Entry>> {
        Ok(self.entries.get(&entry_id).map(|e| e.value().clone()))
    }
}

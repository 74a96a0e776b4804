use anyhow::{Result, anyhow};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, NotSet, QueryOrder, Set,
};

use crate::entities::{files, physical_files, prelude::*};

/// Data needed to create a file row and, when bytes are present, its physical file.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub title: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub content: Option<Vec<u8>>,
}

/// File rows and their physical content, always handled together.
pub struct FileRepository;

impl FileRepository {
    /// Creates the physical file first so the file row can point at it.
    pub async fn create(db: &impl ConnectionTrait, file: NewFile) -> Result<files::Model> {
        let physical_file_id = match file.content {
            Some(value) => {
                let physical = physical_files::ActiveModel {
                    id: NotSet,
                    value: Set(value),
                }
                .insert(db)
                .await?;
                Some(physical.id)
            }
            None => None,
        };

        let created = files::ActiveModel {
            id: NotSet,
            title: Set(file.title),
            size: Set(file.size),
            mime_type: Set(file.mime_type),
            physical_file_id: Set(physical_file_id),
        }
        .insert(db)
        .await?;

        tracing::debug!(
            "Created file {} (physical file: {:?})",
            created.id,
            created.physical_file_id
        );
        Ok(created)
    }

    /// Updates the metadata and, when given, replaces the physical content.
    pub async fn update(
        db: &impl ConnectionTrait,
        file_id: i32,
        title: Option<String>,
        content: Option<Vec<u8>>,
    ) -> Result<files::Model> {
        let file = Self::find_by_primary_key(db, file_id)
            .await?
            .ok_or_else(|| anyhow!("File not found: {}", file_id))?;

        let mut active: files::ActiveModel = file.clone().into();
        if let Some(title) = title {
            active.title = Set(title);
        }

        if let Some(value) = content {
            active.size = Set(value.len() as i64);
            match file.physical_file_id {
                Some(physical_id) => {
                    physical_files::ActiveModel {
                        id: Set(physical_id),
                        value: Set(value),
                    }
                    .update(db)
                    .await?;
                }
                None => {
                    let physical = physical_files::ActiveModel {
                        id: NotSet,
                        value: Set(value),
                    }
                    .insert(db)
                    .await?;
                    active.physical_file_id = Set(Some(physical.id));
                }
            }
        }

        Ok(active.update(db).await?)
    }

    /// Removes the physical file, then the file row.
    pub async fn remove(db: &impl ConnectionTrait, file_id: i32) -> Result<()> {
        let file = Self::find_by_primary_key(db, file_id)
            .await?
            .ok_or_else(|| anyhow!("File not found: {}", file_id))?;

        if let Some(physical_id) = file.physical_file_id {
            PhysicalFiles::delete_by_id(physical_id).exec(db).await?;
        }
        Files::delete_by_id(file_id).exec(db).await?;

        tracing::debug!("Removed file {}", file_id);
        Ok(())
    }

    pub async fn find_by_primary_key(
        db: &impl ConnectionTrait,
        file_id: i32,
    ) -> Result<Option<files::Model>> {
        Ok(Files::find_by_id(file_id).one(db).await?)
    }

    pub async fn load_content(
        db: &impl ConnectionTrait,
        file: &files::Model,
    ) -> Result<Option<Vec<u8>>> {
        let Some(physical_id) = file.physical_file_id else {
            return Ok(None);
        };
        let physical = PhysicalFiles::find_by_id(physical_id).one(db).await?;
        Ok(physical.map(|p| p.value))
    }

    pub async fn list(db: &impl ConnectionTrait) -> Result<Vec<files::Model>> {
        Ok(Files::find()
            .order_by_asc(files::Column::Id)
            .all(db)
            .await?)
    }
}

use crate::entities::{entries, entry_parameters, prelude::*};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait, Set};
use tracing::info;

pub async fn seed_initial_data(db: &DatabaseConnection) -> anyhow::Result<()> {
    seed_entries(db).await?;
    seed_entry_parameters(db).await?;
    Ok(())
}

/// Demo form fields, only when the table is empty.
pub async fn seed_entries(db: &DatabaseConnection) -> anyhow::Result<()> {
    if Entries::find().count(db).await? > 0 {
        return Ok(());
    }

    info!("🌱 Seeding demo entries...");

    let demo = vec![
        (
            "Supporting documents",
            "stored_file",
            Some(2),
            Some(1024 * 1024),
            Some("application/pdf,image/*,text/plain"),
        ),
        ("Photos", "stored_file", Some(5), Some(5 * 1024 * 1024), Some("image/*")),
        ("Remote document", "external_reference", Some(1), None, None),
        ("Comment", "other", None, None, None),
    ];

    for (title, kind, max_files, max_file_size, mimes) in demo {
        entries::ActiveModel {
            id: NotSet,
            title: Set(title.to_string()),
            kind: Set(kind.to_string()),
            max_files: Set(max_files),
            max_file_size: Set(max_file_size),
            allowed_mime_types: Set(mimes.map(str::to_string)),
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

pub async fn seed_entry_parameters(db: &DatabaseConnection) -> anyhow::Result<()> {
    let defaults = [
        ("max_files", "1"),
        ("max_file_size", "1048576"),
        ("display_thumbnails", "true"),
    ];

    for (key, value) in defaults {
        if EntryParameters::find_by_id(key.to_string())
            .one(db)
            .await?
            .is_none()
        {
            entry_parameters::ActiveModel {
                parameter_key: Set(key.to_string()),
                parameter_value: Set(value.to_string()),
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}

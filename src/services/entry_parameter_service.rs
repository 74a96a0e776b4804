use anyhow::{Result, anyhow};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{entry_parameters, prelude::*};

/// A code/label pair, the shape select boxes are filled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReferenceItem {
    pub code: String,
    pub name: String,
}

impl From<entry_parameters::Model> for ReferenceItem {
    fn from(model: entry_parameters::Model) -> Self {
        Self {
            code: model.parameter_key,
            name: model.parameter_value,
        }
    }
}

/// Plugin-wide default parameters for entries.
pub struct EntryParameterService;

impl EntryParameterService {
    pub async fn find_all(db: &impl ConnectionTrait) -> Result<Vec<ReferenceItem>> {
        let params = EntryParameters::find()
            .order_by_asc(entry_parameters::Column::ParameterKey)
            .all(db)
            .await?;
        Ok(params.into_iter().map(ReferenceItem::from).collect())
    }

    pub async fn find_by_key(db: &impl ConnectionTrait, key: &str) -> Result<Option<ReferenceItem>> {
        let param = EntryParameters::find_by_id(key.to_string()).one(db).await?;
        Ok(param.map(ReferenceItem::from))
    }

    /// Changes the value of an existing parameter.
    pub async fn update(db: &impl ConnectionTrait, item: ReferenceItem) -> Result<ReferenceItem> {
        let existing = EntryParameters::find_by_id(item.code.clone())
            .one(db)
            .await?
            .ok_or_else(|| anyhow!("Unknown entry parameter: {}", item.code))?;

        let mut active: entry_parameters::ActiveModel = existing.into();
        active.parameter_value = Set(item.name);
        let updated = active.update(db).await?;

        tracing::info!(
            "Entry parameter '{}' set to '{}'",
            updated.parameter_key,
            updated.parameter_value
        );
        Ok(updated.into())
    }
}

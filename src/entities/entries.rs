use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Form field definitions. Only read here; administration lives elsewhere.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    /// `stored_file`, `external_reference` or `other`
    pub kind: String,
    pub max_files: Option<i32>,
    pub max_file_size: Option<i64>,
    /// Comma separated, `image/*` wildcards allowed
    pub allowed_mime_types: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::record_fields::Entity")]
    RecordFields,
}

impl Related<super::record_fields::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecordFields.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

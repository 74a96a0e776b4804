use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub physical_file_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::physical_files::Entity",
        from = "Column::PhysicalFileId",
        to = "super::physical_files::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    PhysicalFiles,
    #[sea_orm(has_many = "super::record_fields::Entity")]
    RecordFields,
}

impl Related<super::physical_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PhysicalFiles.def()
    }
}

impl Related<super::record_fields::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecordFields.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

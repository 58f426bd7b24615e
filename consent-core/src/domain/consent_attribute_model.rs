// src/domain/consent_attribute_model.rs
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 同意スコープの任意キー/値メタデータ。バージョニングされず、
/// 更新時はその場で上書きされる
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_attributes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub consent_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub attribute_key: String,
    #[sea_orm(column_type = "Text")]
    pub attribute_value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consent_model::Entity",
        from = "Column::ConsentId",
        to = "super::consent_model::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Consent,
}

impl Related<super::consent_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

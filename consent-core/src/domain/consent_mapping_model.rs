// src/domain/consent_mapping_model.rs
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// アカウント・権限のバインディング。認可リソースの文脈でのみ存在する。
/// 行は削除されず、mapping_status を inactive に倒すことで
/// 「かつて何が許可されていたか」を監査可能なまま保持する
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub authorization_id: Uuid,
    pub account_id: String,
    pub permission: String,
    /// バインド対象リソースの任意ペイロード
    #[sea_orm(nullable)]
    pub resource: Option<Json>,
    /// active / inactive
    pub mapping_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consent_authorization_model::Entity",
        from = "Column::AuthorizationId",
        to = "super::consent_authorization_model::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ConsentAuthorization,
}

impl Related<super::consent_authorization_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsentAuthorization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

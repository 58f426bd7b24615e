// src/domain/consent_authorization_model.rs
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, DbErr, Set};
use serde::{Deserialize, Serialize};

/// 認可リソース。1つの同意に0個以上ぶら下がる
/// （暗黙認可・明示認可・再認可・共同認可者など）
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_authorizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consent_id: Uuid,
    /// ユーザー紐付けまでは NULL
    #[sea_orm(nullable)]
    pub user_id: Option<String>,
    pub authorization_status: String,
    /// 例: "authorization" / "cancellation"
    pub authorization_type: String,
    pub updated_at: DateTime<Utc>,
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
    #[sea_orm(has_many = "super::consent_mapping_model::Entity")]
    ConsentMapping,
}

impl Related<super::consent_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consent.def()
    }
}

impl Related<super::consent_mapping_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsentMapping.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            updated_at: Set(Utc::now()),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = Set(Utc::now());
        }
        Ok(self)
    }
}

// src/domain/consent_model.rs
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, DbErr, Set};
use serde::{Deserialize, Serialize};

/// 同意リソース。物理削除されず、失効後も履歴として残る
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub org_id: String,
    pub client_id: String,
    /// 同意内容のレシート（不透明なJSONペイロード）
    pub receipt: Json,
    pub consent_type: String,
    /// 1日あたりの最大利用回数
    pub frequency: i32,
    /// 有効期限（エポック秒、0 は無期限）
    pub validity_period: i64,
    pub recurring_indicator: bool,
    /// オープンな文字列集合。遷移はライフサイクルマネージャ経由でのみ変更される
    pub current_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consent_authorization_model::Entity")]
    ConsentAuthorization,
    #[sea_orm(has_many = "super::consent_status_audit_model::Entity")]
    ConsentStatusAudit,
}

impl Related<super::consent_authorization_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsentAuthorization.def()
    }
}

impl Related<super::consent_status_audit_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsentStatusAudit.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            // 更新の場合のみ updated_at を更新
            self.updated_at = Set(Utc::now());
        }
        Ok(self)
    }
}

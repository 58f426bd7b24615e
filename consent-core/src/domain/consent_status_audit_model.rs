// src/domain/consent_status_audit_model.rs
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

/// ステータス監査レコード。追記専用で、受理された遷移1件につき必ず1行
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_status_audit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consent_id: Uuid,
    pub current_status: String,
    /// 初回作成時は NULL
    #[sea_orm(nullable)]
    pub previous_status: Option<String>,
    #[sea_orm(nullable)]
    pub action_by: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub action_time: DateTime<Utc>,
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

// 監査レコードビルダー
pub struct AuditRecordBuilder {
    consent_id: Uuid,
    current_status: String,
    previous_status: Option<String>,
    action_by: Option<String>,
    reason: Option<String>,
}

impl AuditRecordBuilder {
    pub fn new(consent_id: Uuid, current_status: impl Into<String>) -> Self {
        Self {
            consent_id,
            current_status: current_status.into(),
            previous_status: None,
            action_by: None,
            reason: None,
        }
    }

    pub fn previous_status(mut self, status: impl Into<String>) -> Self {
        self.previous_status = Some(status.into());
        self
    }

    pub fn action_by(mut self, user: impl Into<String>) -> Self {
        self.action_by = Some(user.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn build(self) -> ActiveModel {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            consent_id: Set(self.consent_id),
            current_status: Set(self.current_status),
            previous_status: Set(self.previous_status),
            action_by: Set(self.action_by),
            reason: Set(self.reason),
            action_time: Set(Utc::now()),
        }
    }
}

// src/domain/consent_history_model.rs
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::detailed_consent::DetailedConsent;

/// 修正履歴の差分行。1回の修正（history_id）につきセクション単位で
/// 変更があった分だけ行が書かれる。書き込み後は不変
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consent_amendment_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// 対応する監査レコードのID
    pub history_id: Uuid,
    pub consent_id: Uuid,
    /// 差分対象エンティティのID（consent / authorization / mapping）
    pub record_id: Uuid,
    pub section_type: String,
    /// 修正前の値。NULL は「修正前には存在しなかった」の印
    #[sea_orm(nullable)]
    pub changed_attributes: Option<Json>,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub amended_at: DateTime<Utc>,
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

// 差分行の論理セクション
pub mod section {
    pub const CONSENT_DATA: &str = "ConsentData";
    pub const CONSENT_ATTRIBUTES_DATA: &str = "ConsentAttributesData";
    pub const CONSENT_MAPPING_DATA: &str = "ConsentMappingData";
    pub const CONSENT_AUTH_RESOURCE_DATA: &str = "ConsentAuthResourceData";
}

/// 再構築済みの修正履歴1件分
#[derive(Debug, Clone, Serialize)]
pub struct ConsentHistoryEntry {
    pub history_id: Uuid,
    pub amended_at: DateTime<Utc>,
    pub reason: String,
    /// この修正が適用される直前の詳細同意スナップショット
    pub detailed_consent: DetailedConsent,
}

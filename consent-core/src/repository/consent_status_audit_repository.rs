// src/repository/consent_status_audit_repository.rs
use crate::domain::consent_status_audit_model::{
    self, ActiveModel as AuditActiveModel, Entity as AuditEntity,
};
use crate::dto::consent_dto::AuditSearchFilter;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use sea_orm::{Condition, Order, QueryFilter, QueryOrder};
use uuid::Uuid;

/// ステータス監査テーブルのプリミティブ。挿入と検索のみ
/// （更新・削除は存在しない）
pub struct ConsentStatusAuditRepository;

impl ConsentStatusAuditRepository {
    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        record: AuditActiveModel,
    ) -> Result<consent_status_audit_model::Model, DbErr> {
        record.insert(conn).await
    }

    /// 指定されたフィルタのみをANDで適用する
    pub async fn search<C: ConnectionTrait>(
        conn: &C,
        filter: &AuditSearchFilter,
    ) -> Result<Vec<consent_status_audit_model::Model>, DbErr> {
        let mut conditions = Condition::all();

        if let Some(consent_id) = filter.consent_id {
            conditions = conditions.add(consent_status_audit_model::Column::ConsentId.eq(consent_id));
        }

        if let Some(status) = &filter.status {
            conditions =
                conditions.add(consent_status_audit_model::Column::CurrentStatus.eq(status.as_str()));
        }

        if let Some(action_by) = &filter.action_by {
            conditions =
                conditions.add(consent_status_audit_model::Column::ActionBy.eq(action_by.as_str()));
        }

        if let Some(from_time) = filter.from_time {
            conditions = conditions.add(consent_status_audit_model::Column::ActionTime.gte(from_time));
        }

        if let Some(to_time) = filter.to_time {
            conditions = conditions.add(consent_status_audit_model::Column::ActionTime.lte(to_time));
        }

        if let Some(audit_id) = filter.audit_id {
            conditions = conditions.add(consent_status_audit_model::Column::Id.eq(audit_id));
        }

        AuditEntity::find()
            .filter(conditions)
            .order_by(consent_status_audit_model::Column::ActionTime, Order::Desc)
            .all(conn)
            .await
    }

    /// ページネーション付きの取得。consent_ids が None なら全件が対象
    pub async fn find_by_consent_ids<C: ConnectionTrait>(
        conn: &C,
        consent_ids: Option<Vec<Uuid>>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<consent_status_audit_model::Model>, DbErr> {
        let mut query = AuditEntity::find();

        if let Some(ids) = consent_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(consent_status_audit_model::Column::ConsentId.is_in(ids));
        }

        query
            .order_by(consent_status_audit_model::Column::ActionTime, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(conn)
            .await
    }
}

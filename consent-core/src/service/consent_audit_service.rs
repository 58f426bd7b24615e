// src/service/consent_audit_service.rs
use crate::db::DbPool;
use crate::domain::consent_status_audit_model::{self, AuditRecordBuilder};
use crate::dto::consent_dto::AuditSearchFilter;
use crate::error::ConsentResult;
use crate::repository::consent_status_audit_repository::ConsentStatusAuditRepository;
use sea_orm::ConnectionTrait;
use uuid::Uuid;

/// 監査レコーダー。受理された状態遷移1件につき必ず1行を追記する。
/// 書き込みは呼び出し元のトランザクション内で行われ、遷移と同時に
/// コミット／ロールバックされる
pub struct ConsentAuditService {
    db: DbPool,
}

impl ConsentAuditService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// 遷移と同一トランザクションで監査行を追記する
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        consent_id: Uuid,
        current_status: &str,
        previous_status: Option<&str>,
        action_by: Option<&str>,
        reason: Option<&str>,
    ) -> ConsentResult<consent_status_audit_model::Model> {
        let mut builder = AuditRecordBuilder::new(consent_id, current_status);
        if let Some(previous) = previous_status {
            builder = builder.previous_status(previous);
        }
        if let Some(user) = action_by {
            builder = builder.action_by(user);
        }
        if let Some(reason) = reason {
            builder = builder.reason(reason);
        }

        let record = ConsentStatusAuditRepository::insert(conn, builder.build()).await?;

        tracing::debug!(
            consent_id = %consent_id,
            current_status = %record.current_status,
            "Recorded consent status audit entry"
        );

        Ok(record)
    }

    pub async fn search_audit_records(
        &self,
        filter: &AuditSearchFilter,
    ) -> ConsentResult<Vec<consent_status_audit_model::Model>> {
        let records = ConsentStatusAuditRepository::search(&self.db, filter).await?;
        Ok(records)
    }

    /// 同意ID集合に対するページネーション付き取得。
    /// consent_ids が None なら全件が対象
    pub async fn get_audit_records(
        &self,
        consent_ids: Option<Vec<Uuid>>,
        limit: u64,
        offset: u64,
    ) -> ConsentResult<Vec<consent_status_audit_model::Model>> {
        let records =
            ConsentStatusAuditRepository::find_by_consent_ids(&self.db, consent_ids, limit, offset)
                .await?;
        Ok(records)
    }
}

// src/repository/consent_history_repository.rs
use crate::domain::consent_history_model::{
    self, ActiveModel as HistoryActiveModel, Entity as HistoryEntity,
};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use sea_orm::{Order, QueryFilter, QueryOrder};
use uuid::Uuid;

/// 修正履歴ストアのプリミティブ。書き込みは挿入のみ
pub struct ConsentHistoryRepository;

impl ConsentHistoryRepository {
    pub async fn insert_many<C: ConnectionTrait>(
        conn: &C,
        rows: Vec<HistoryActiveModel>,
    ) -> Result<(), DbErr> {
        for row in rows {
            row.insert(conn).await?;
        }
        Ok(())
    }

    /// 同意に属する差分行を新しい修正から順に取得する。
    /// history_ids が指定された場合はその修正のみに絞る
    pub async fn find_for_consent<C: ConnectionTrait>(
        conn: &C,
        consent_id: Uuid,
        history_ids: Option<Vec<Uuid>>,
    ) -> Result<Vec<consent_history_model::Model>, DbErr> {
        let mut query =
            HistoryEntity::find().filter(consent_history_model::Column::ConsentId.eq(consent_id));

        if let Some(ids) = history_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(consent_history_model::Column::HistoryId.is_in(ids));
        }

        // 同一タイムスタンプの修正同士が混ざらないよう history_id で固定する
        query
            .order_by(consent_history_model::Column::AmendedAt, Order::Desc)
            .order_by(consent_history_model::Column::HistoryId, Order::Desc)
            .all(conn)
            .await
    }
}

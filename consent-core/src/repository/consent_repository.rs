// src/repository/consent_repository.rs
use crate::domain::consent_model::{self, ActiveModel as ConsentActiveModel, Entity as ConsentEntity};
use crate::dto::consent_dto::{ConsentSearchFilter, CreateConsentDto};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};
use sea_orm::{Condition, Order, QueryFilter, QueryOrder};
use uuid::Uuid;

/// 同意テーブルのCRUDプリミティブ。
/// サービス層が1トランザクションで複数リポジトリを束ねられるよう、
/// すべての操作は接続（またはトランザクション）を引数に取る
pub struct ConsentRepository;

impl ConsentRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        payload: &CreateConsentDto,
    ) -> Result<consent_model::Model, DbErr> {
        let now = Utc::now();
        let new_consent = ConsentActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(payload.org_id.clone()),
            client_id: Set(payload.client_id.clone()),
            receipt: Set(payload.receipt.clone()),
            consent_type: Set(payload.consent_type.clone()),
            frequency: Set(payload.frequency),
            validity_period: Set(payload.validity_period),
            recurring_indicator: Set(payload.recurring_indicator),
            current_status: Set(payload.current_status.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        new_consent.insert(conn).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<consent_model::Model>, DbErr> {
        ConsentEntity::find_by_id(id).one(conn).await
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        conn: &C,
        ids: Vec<Uuid>,
    ) -> Result<Vec<consent_model::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ConsentEntity::find()
            .filter(consent_model::Column::Id.is_in(ids))
            .all(conn)
            .await
    }

    /// ステータスを楽観的ガード付きで更新する。
    /// rows_affected == 0 は「他の遷移に先を越された」ことを意味する
    pub async fn update_status_guarded<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        expected_status: &str,
        new_status: &str,
    ) -> Result<u64, DbErr> {
        let result = ConsentEntity::update_many()
            .col_expr(consent_model::Column::CurrentStatus, Expr::value(new_status))
            .col_expr(consent_model::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(consent_model::Column::Id.eq(id))
            .filter(consent_model::Column::CurrentStatus.eq(expected_status))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn update_receipt<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        receipt: &serde_json::Value,
    ) -> Result<(), DbErr> {
        ConsentEntity::update_many()
            .col_expr(consent_model::Column::Receipt, Expr::value(receipt.clone()))
            .col_expr(consent_model::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(consent_model::Column::Id.eq(id))
            .exec(conn)
            .await?;
        Ok(())
    }

    pub async fn update_validity_period<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        validity_period: i64,
    ) -> Result<(), DbErr> {
        ConsentEntity::update_many()
            .col_expr(
                consent_model::Column::ValidityPeriod,
                Expr::value(validity_period),
            )
            .col_expr(consent_model::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(consent_model::Column::Id.eq(id))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// 複合検索。リストフィルタは is_in でOR、パラメータ間はAND。
    /// ユーザーフィルタは認可リソース経由で解決済みの同意IDとして渡される
    pub async fn search<C: ConnectionTrait>(
        conn: &C,
        filter: &ConsentSearchFilter,
        consent_ids_for_users: Option<Vec<Uuid>>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<consent_model::Model>, DbErr> {
        let mut conditions =
            Condition::all().add(consent_model::Column::OrgId.eq(filter.org_id.as_str()));

        if let Some(consent_ids) = &filter.consent_ids {
            if !consent_ids.is_empty() {
                conditions = conditions.add(consent_model::Column::Id.is_in(consent_ids.clone()));
            }
        }

        if let Some(ids) = consent_ids_for_users {
            conditions = conditions.add(consent_model::Column::Id.is_in(ids));
        }

        if let Some(client_ids) = &filter.client_ids {
            if !client_ids.is_empty() {
                conditions =
                    conditions.add(consent_model::Column::ClientId.is_in(client_ids.clone()));
            }
        }

        if let Some(types) = &filter.consent_types {
            if !types.is_empty() {
                conditions = conditions.add(consent_model::Column::ConsentType.is_in(types.clone()));
            }
        }

        if let Some(statuses) = &filter.statuses {
            if !statuses.is_empty() {
                conditions =
                    conditions.add(consent_model::Column::CurrentStatus.is_in(statuses.clone()));
            }
        }

        // 時間範囲フィルタ
        if let Some(from_time) = filter.from_time {
            conditions = conditions.add(consent_model::Column::UpdatedAt.gte(from_time));
        }

        if let Some(to_time) = filter.to_time {
            conditions = conditions.add(consent_model::Column::UpdatedAt.lte(to_time));
        }

        ConsentEntity::find()
            .filter(conditions)
            .order_by(consent_model::Column::UpdatedAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(conn)
            .await
    }

    /// 有効期限切れ候補の同意（validity_period は 0 で無期限）
    pub async fn find_eligible_for_expiration<C: ConnectionTrait>(
        conn: &C,
        statuses: &[String],
        now_epoch: i64,
    ) -> Result<Vec<consent_model::Model>, DbErr> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        ConsentEntity::find()
            .filter(consent_model::Column::ValidityPeriod.gt(0))
            .filter(consent_model::Column::ValidityPeriod.lt(now_epoch))
            .filter(consent_model::Column::CurrentStatus.is_in(statuses.to_vec()))
            .all(conn)
            .await
    }
}

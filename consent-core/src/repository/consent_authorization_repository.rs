// src/repository/consent_authorization_repository.rs
use crate::domain::consent_authorization_model::{
    self, ActiveModel as AuthorizationActiveModel, Entity as AuthorizationEntity,
};
use crate::dto::consent_dto::NewAuthorizationDto;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};
use sea_orm::{Condition, QueryFilter};
use uuid::Uuid;

/// 認可リソーステーブルのCRUDプリミティブ
pub struct ConsentAuthorizationRepository;

impl ConsentAuthorizationRepository {
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        consent_id: Uuid,
        payload: &NewAuthorizationDto,
    ) -> Result<consent_authorization_model::Model, DbErr> {
        let new_authorization = AuthorizationActiveModel {
            id: Set(Uuid::new_v4()),
            consent_id: Set(consent_id),
            user_id: Set(payload.user_id.clone()),
            authorization_status: Set(payload.authorization_status.clone()),
            authorization_type: Set(payload.authorization_type.clone()),
            updated_at: Set(Utc::now()),
        };
        new_authorization.insert(conn).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<consent_authorization_model::Model>, DbErr> {
        AuthorizationEntity::find_by_id(id).one(conn).await
    }

    /// 検索ページ全体の認可をまとめて取得（N+1回避）
    pub async fn find_by_consent_ids<C: ConnectionTrait>(
        conn: &C,
        consent_ids: Vec<Uuid>,
    ) -> Result<Vec<consent_authorization_model::Model>, DbErr> {
        if consent_ids.is_empty() {
            return Ok(Vec::new());
        }
        AuthorizationEntity::find()
            .filter(consent_authorization_model::Column::ConsentId.is_in(consent_ids))
            .all(conn)
            .await
    }

    /// 両フィルタとも任意。未指定のフィルタは無制約
    pub async fn search<C: ConnectionTrait>(
        conn: &C,
        consent_id: Option<Uuid>,
        user_id: Option<&str>,
    ) -> Result<Vec<consent_authorization_model::Model>, DbErr> {
        let mut conditions = Condition::all();

        if let Some(consent_id) = consent_id {
            conditions =
                conditions.add(consent_authorization_model::Column::ConsentId.eq(consent_id));
        }

        if let Some(user_id) = user_id {
            conditions = conditions.add(consent_authorization_model::Column::UserId.eq(user_id));
        }

        AuthorizationEntity::find()
            .filter(conditions)
            .all(conn)
            .await
    }

    /// ユーザーIDから同意IDを逆引き（検索エンジンのユーザーフィルタ用）
    pub async fn find_consent_ids_by_users<C: ConnectionTrait>(
        conn: &C,
        user_ids: &[String],
    ) -> Result<Vec<Uuid>, DbErr> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let authorizations = AuthorizationEntity::find()
            .filter(consent_authorization_model::Column::UserId.is_in(user_ids.to_vec()))
            .all(conn)
            .await?;

        let mut consent_ids: Vec<Uuid> =
            authorizations.into_iter().map(|a| a.consent_id).collect();
        consent_ids.sort_unstable();
        consent_ids.dedup();
        Ok(consent_ids)
    }

    pub async fn update_status<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        new_status: &str,
    ) -> Result<u64, DbErr> {
        let result = AuthorizationEntity::update_many()
            .col_expr(
                consent_authorization_model::Column::AuthorizationStatus,
                Expr::value(new_status),
            )
            .col_expr(
                consent_authorization_model::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(consent_authorization_model::Column::Id.eq(id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn update_user<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        user_id: &str,
    ) -> Result<u64, DbErr> {
        let result = AuthorizationEntity::update_many()
            .col_expr(
                consent_authorization_model::Column::UserId,
                Expr::value(Some(user_id.to_string())),
            )
            .col_expr(
                consent_authorization_model::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(consent_authorization_model::Column::Id.eq(id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

// src/repository/consent_mapping_repository.rs
use crate::domain::consent_mapping_model::{
    self, ActiveModel as MappingActiveModel, Entity as MappingEntity,
};
use crate::domain::mapping_status::MappingStatus;
use crate::dto::consent_dto::NewMappingDto;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};
use sea_orm::QueryFilter;
use uuid::Uuid;

/// アカウントマッピングテーブルのCRUDプリミティブ。
/// 削除系の操作は存在しない（非活性化のみ）
pub struct ConsentMappingRepository;

impl ConsentMappingRepository {
    pub async fn create_many<C: ConnectionTrait>(
        conn: &C,
        authorization_id: Uuid,
        payloads: Vec<NewMappingDto>,
    ) -> Result<Vec<consent_mapping_model::Model>, DbErr> {
        let mut created_models = Vec::with_capacity(payloads.len());

        for payload in payloads {
            let new_mapping = MappingActiveModel {
                id: Set(Uuid::new_v4()),
                authorization_id: Set(authorization_id),
                account_id: Set(payload.account_id),
                permission: Set(payload.permission),
                resource: Set(payload.resource),
                mapping_status: Set(MappingStatus::Active.as_str().to_string()),
            };
            let model = new_mapping.insert(conn).await?;
            created_models.push(model);
        }

        Ok(created_models)
    }

    /// ページ全体の認可IDからマッピングをまとめて取得（N+1回避）
    pub async fn find_by_authorization_ids<C: ConnectionTrait>(
        conn: &C,
        authorization_ids: Vec<Uuid>,
    ) -> Result<Vec<consent_mapping_model::Model>, DbErr> {
        if authorization_ids.is_empty() {
            return Ok(Vec::new());
        }
        MappingEntity::find()
            .filter(consent_mapping_model::Column::AuthorizationId.is_in(authorization_ids))
            .all(conn)
            .await
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        conn: &C,
        ids: Vec<Uuid>,
    ) -> Result<Vec<consent_mapping_model::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        MappingEntity::find()
            .filter(consent_mapping_model::Column::Id.is_in(ids))
            .all(conn)
            .await
    }

    /// 状態の一括変更。空のID集合は何もしない（冪等）
    pub async fn update_status_many<C: ConnectionTrait>(
        conn: &C,
        ids: Vec<Uuid>,
        new_status: MappingStatus,
    ) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = MappingEntity::update_many()
            .col_expr(
                consent_mapping_model::Column::MappingStatus,
                Expr::value(new_status.as_str()),
            )
            .filter(consent_mapping_model::Column::Id.is_in(ids))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

// src/repository/consent_attribute_repository.rs
use crate::domain::consent_attribute_model::{
    self, ActiveModel as AttributeActiveModel, Entity as AttributeEntity,
};
use sea_orm::sea_query::OnConflict;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};
use sea_orm::QueryFilter;
use std::collections::HashMap;
use uuid::Uuid;

/// 同意属性テーブルのCRUDプリミティブ
pub struct ConsentAttributeRepository;

impl ConsentAttributeRepository {
    /// 冪等なupsert。既存キーはその場で上書きされる
    pub async fn upsert_many<C: ConnectionTrait>(
        conn: &C,
        consent_id: Uuid,
        attributes: &HashMap<String, String>,
    ) -> Result<(), DbErr> {
        for (key, value) in attributes {
            let attribute = AttributeActiveModel {
                consent_id: Set(consent_id),
                attribute_key: Set(key.clone()),
                attribute_value: Set(value.clone()),
            };
            AttributeEntity::insert(attribute)
                .on_conflict(
                    OnConflict::columns([
                        consent_attribute_model::Column::ConsentId,
                        consent_attribute_model::Column::AttributeKey,
                    ])
                    .update_column(consent_attribute_model::Column::AttributeValue)
                    .to_owned(),
                )
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn find_by_consent_id<C: ConnectionTrait>(
        conn: &C,
        consent_id: Uuid,
    ) -> Result<Vec<consent_attribute_model::Model>, DbErr> {
        AttributeEntity::find()
            .filter(consent_attribute_model::Column::ConsentId.eq(consent_id))
            .all(conn)
            .await
    }

    /// ページ全体の属性をまとめて取得（N+1回避）
    pub async fn find_by_consent_ids<C: ConnectionTrait>(
        conn: &C,
        consent_ids: Vec<Uuid>,
    ) -> Result<Vec<consent_attribute_model::Model>, DbErr> {
        if consent_ids.is_empty() {
            return Ok(Vec::new());
        }
        AttributeEntity::find()
            .filter(consent_attribute_model::Column::ConsentId.is_in(consent_ids))
            .all(conn)
            .await
    }

    /// 属性名からの逆引き（例: セッションキー → 同意）
    pub async fn find_by_key<C: ConnectionTrait>(
        conn: &C,
        attribute_key: &str,
    ) -> Result<Vec<consent_attribute_model::Model>, DbErr> {
        AttributeEntity::find()
            .filter(consent_attribute_model::Column::AttributeKey.eq(attribute_key))
            .all(conn)
            .await
    }

    pub async fn find_consent_ids_by_key_value<C: ConnectionTrait>(
        conn: &C,
        attribute_key: &str,
        attribute_value: &str,
    ) -> Result<Vec<Uuid>, DbErr> {
        let attributes = AttributeEntity::find()
            .filter(consent_attribute_model::Column::AttributeKey.eq(attribute_key))
            .filter(consent_attribute_model::Column::AttributeValue.eq(attribute_value))
            .all(conn)
            .await?;
        Ok(attributes.into_iter().map(|a| a.consent_id).collect())
    }

    /// 指定キーのみ削除する（属性は唯一の物理削除対象）
    pub async fn delete_keys<C: ConnectionTrait>(
        conn: &C,
        consent_id: Uuid,
        keys: &[String],
    ) -> Result<u64, DbErr> {
        if keys.is_empty() {
            return Ok(0);
        }
        let result = AttributeEntity::delete_many()
            .filter(consent_attribute_model::Column::ConsentId.eq(consent_id))
            .filter(consent_attribute_model::Column::AttributeKey.is_in(keys.to_vec()))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

// src/service/consent_attribute_service.rs
use crate::db::DbPool;
use crate::error::ConsentResult;
use crate::repository::consent_attribute_repository::ConsentAttributeRepository;
use crate::repository::consent_repository::ConsentRepository;
use crate::utils::error_helper::{not_found_error, validation_error};
use std::collections::HashMap;
use uuid::Uuid;

/// 属性ストア。同意に紐付く自由形式のキー・バリューを管理する
pub struct ConsentAttributeService {
    db: DbPool,
}

impl ConsentAttributeService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// 属性を保存する。既存キーは上書き（冪等upsert）
    pub async fn store_attributes(
        &self,
        consent_id: Uuid,
        attributes: &HashMap<String, String>,
    ) -> ConsentResult<()> {
        if attributes.is_empty() {
            return Err(validation_error(
                "Attributes must not be empty",
                "consent_attribute_service::store_attributes",
            ));
        }
        self.ensure_consent_exists(consent_id).await?;
        ConsentAttributeRepository::upsert_many(&self.db, consent_id, attributes).await?;
        Ok(())
    }

    /// 同意の属性を取得する。keys が指定された場合はそのキーのみに絞る
    pub async fn get_attributes(
        &self,
        consent_id: Uuid,
        keys: Option<&[String]>,
    ) -> ConsentResult<HashMap<String, String>> {
        self.ensure_consent_exists(consent_id).await?;
        let models = ConsentAttributeRepository::find_by_consent_id(&self.db, consent_id).await?;

        let attributes = models
            .into_iter()
            .filter(|m| match keys {
                Some(keys) => keys.contains(&m.attribute_key),
                None => true,
            })
            .map(|m| (m.attribute_key, m.attribute_value))
            .collect();

        Ok(attributes)
    }

    /// 属性名から全同意を横断して値を引く（consent_id → 値）
    pub async fn get_attributes_by_name(
        &self,
        attribute_key: &str,
    ) -> ConsentResult<HashMap<Uuid, String>> {
        if attribute_key.is_empty() {
            return Err(validation_error(
                "Attribute key must not be empty",
                "consent_attribute_service::get_attributes_by_name",
            ));
        }
        let models = ConsentAttributeRepository::find_by_key(&self.db, attribute_key).await?;
        Ok(models
            .into_iter()
            .map(|m| (m.consent_id, m.attribute_value))
            .collect())
    }

    /// (キー, 値) の組から同意IDを逆引きする
    pub async fn get_consent_ids_by_attribute(
        &self,
        attribute_key: &str,
        attribute_value: &str,
    ) -> ConsentResult<Vec<Uuid>> {
        if attribute_key.is_empty() || attribute_value.is_empty() {
            return Err(validation_error(
                "Attribute key and value must not be empty",
                "consent_attribute_service::get_consent_ids_by_attribute",
            ));
        }
        let ids = ConsentAttributeRepository::find_consent_ids_by_key_value(
            &self.db,
            attribute_key,
            attribute_value,
        )
        .await?;
        Ok(ids)
    }

    /// 既存属性の更新。保存と同じ冪等upsertだが、呼び出し側の意図を
    /// 区別できるよう別名で公開する
    pub async fn update_attributes(
        &self,
        consent_id: Uuid,
        attributes: &HashMap<String, String>,
    ) -> ConsentResult<()> {
        self.store_attributes(consent_id, attributes).await
    }

    /// 指定キーの属性を削除し、削除行数を返す
    pub async fn delete_attributes(
        &self,
        consent_id: Uuid,
        keys: &[String],
    ) -> ConsentResult<u64> {
        if keys.is_empty() {
            return Err(validation_error(
                "Attribute keys must not be empty",
                "consent_attribute_service::delete_attributes",
            ));
        }
        self.ensure_consent_exists(consent_id).await?;
        let deleted = ConsentAttributeRepository::delete_keys(&self.db, consent_id, keys).await?;
        Ok(deleted)
    }

    async fn ensure_consent_exists(&self, consent_id: Uuid) -> ConsentResult<()> {
        ConsentRepository::find_by_id(&self.db, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Consent not found: {}", consent_id),
                    "consent_attribute_service",
                )
            })?;
        Ok(())
    }
}

// src/service/consent_authorization_service.rs
use crate::db::DbPool;
use crate::domain::consent_authorization_model;
use crate::domain::consent_mapping_model;
use crate::domain::mapping_status::MappingStatus;
use crate::dto::consent_dto::{AccountPermissionsMap, NewAuthorizationDto, NewMappingDto};
use crate::error::ConsentResult;
use crate::repository::consent_authorization_repository::ConsentAuthorizationRepository;
use crate::repository::consent_mapping_repository::ConsentMappingRepository;
use crate::repository::consent_repository::ConsentRepository;
use crate::service::consent_audit_service::ConsentAuditService;
use crate::utils::error_helper::{
    conflict_error, convert_validation_errors, not_found_error, validation_error,
};
use sea_orm::TransactionTrait;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// account_id → 権限リストを個別のマッピング行に展開する
pub(crate) fn expand_account_permissions(
    account_permissions: &AccountPermissionsMap,
) -> Vec<NewMappingDto> {
    let mut mappings = Vec::new();
    for (account_id, permissions) in account_permissions {
        for permission in permissions {
            mappings.push(NewMappingDto {
                account_id: account_id.clone(),
                permission: permission.clone(),
                resource: None,
            });
        }
    }
    mappings
}

/// 認可・マッピングマネージャ。認可リソースとアカウントマッピングの
/// 作成・検索・状態変更を担う
pub struct ConsentAuthorizationService {
    db: DbPool,
    audit_service: Arc<ConsentAuditService>,
}

impl ConsentAuthorizationService {
    pub fn new(db: DbPool, audit_service: Arc<ConsentAuditService>) -> Self {
        Self { db, audit_service }
    }

    /// 既存の同意に認可リソースを追加する
    pub async fn create_authorization(
        &self,
        consent_id: Uuid,
        payload: &NewAuthorizationDto,
    ) -> ConsentResult<consent_authorization_model::Model> {
        payload.validate().map_err(|e| {
            convert_validation_errors(e, "consent_authorization_service::create_authorization")
        })?;

        ConsentRepository::find_by_id(&self.db, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Consent not found: {}", consent_id),
                    "consent_authorization_service::create_authorization",
                )
            })?;

        let authorization =
            ConsentAuthorizationRepository::create(&self.db, consent_id, payload).await?;

        tracing::info!(
            consent_id = %consent_id,
            authorization_id = %authorization.id,
            "Created authorization resource"
        );

        Ok(authorization)
    }

    pub async fn get_authorization(
        &self,
        authorization_id: Uuid,
    ) -> ConsentResult<consent_authorization_model::Model> {
        ConsentAuthorizationRepository::find_by_id(&self.db, authorization_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Authorization resource not found: {}", authorization_id),
                    "consent_authorization_service::get_authorization",
                )
            })
    }

    /// 同意ID・ユーザーIDによる検索。両方とも任意
    pub async fn search_authorizations(
        &self,
        consent_id: Option<Uuid>,
        user_id: Option<&str>,
    ) -> ConsentResult<Vec<consent_authorization_model::Model>> {
        let authorizations =
            ConsentAuthorizationRepository::search(&self.db, consent_id, user_id).await?;
        Ok(authorizations)
    }

    pub async fn update_authorization_status(
        &self,
        authorization_id: Uuid,
        new_status: &str,
    ) -> ConsentResult<()> {
        if new_status.is_empty() {
            return Err(validation_error(
                "Authorization status must not be empty",
                "consent_authorization_service::update_authorization_status",
            ));
        }
        let rows_affected =
            ConsentAuthorizationRepository::update_status(&self.db, authorization_id, new_status)
                .await?;
        if rows_affected == 0 {
            return Err(not_found_error(
                &format!("Authorization resource not found: {}", authorization_id),
                "consent_authorization_service::update_authorization_status",
            ));
        }
        Ok(())
    }

    pub async fn update_authorization_user(
        &self,
        authorization_id: Uuid,
        user_id: &str,
    ) -> ConsentResult<()> {
        if user_id.is_empty() {
            return Err(validation_error(
                "User ID must not be empty",
                "consent_authorization_service::update_authorization_user",
            ));
        }
        let rows_affected =
            ConsentAuthorizationRepository::update_user(&self.db, authorization_id, user_id)
                .await?;
        if rows_affected == 0 {
            return Err(not_found_error(
                &format!("Authorization resource not found: {}", authorization_id),
                "consent_authorization_service::update_authorization_user",
            ));
        }
        Ok(())
    }

    /// ユーザーを認可リソースに紐付け、アカウントマッピングを作成し、
    /// 同意を次の状態へ進める。全体が1トランザクション
    pub async fn bind_user_accounts_to_consent(
        &self,
        consent_id: Uuid,
        authorization_id: Uuid,
        user_id: &str,
        account_permissions: &AccountPermissionsMap,
        new_authorization_status: &str,
        new_consent_status: &str,
    ) -> ConsentResult<()> {
        let context = "consent_authorization_service::bind_user_accounts_to_consent";
        if user_id.is_empty() {
            return Err(validation_error("User ID must not be empty", context));
        }
        if account_permissions.is_empty() {
            return Err(validation_error(
                "Account permissions must not be empty",
                context,
            ));
        }
        if new_authorization_status.is_empty() || new_consent_status.is_empty() {
            return Err(validation_error(
                "New authorization and consent statuses must not be empty",
                context,
            ));
        }

        let txn = self.db.begin().await?;

        let consent = ConsentRepository::find_by_id(&txn, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(&format!("Consent not found: {}", consent_id), context)
            })?;

        let authorization = ConsentAuthorizationRepository::find_by_id(&txn, authorization_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Authorization resource not found: {}", authorization_id),
                    context,
                )
            })?;
        if authorization.consent_id != consent_id {
            return Err(validation_error(
                "Authorization resource does not belong to the consent",
                context,
            ));
        }

        ConsentAuthorizationRepository::update_user(&txn, authorization_id, user_id).await?;
        ConsentAuthorizationRepository::update_status(
            &txn,
            authorization_id,
            new_authorization_status,
        )
        .await?;

        let mappings = expand_account_permissions(account_permissions);
        ConsentMappingRepository::create_many(&txn, authorization_id, mappings).await?;

        let rows_affected = ConsentRepository::update_status_guarded(
            &txn,
            consent_id,
            &consent.current_status,
            new_consent_status,
        )
        .await?;
        if rows_affected == 0 {
            return Err(conflict_error(
                &format!("Consent {} was concurrently modified", consent_id),
                context,
            ));
        }

        self.audit_service
            .record(
                &txn,
                consent_id,
                new_consent_status,
                Some(&consent.current_status),
                Some(user_id),
                Some("Bind user accounts to consent"),
            )
            .await?;

        txn.commit().await?;

        tracing::info!(
            consent_id = %consent_id,
            authorization_id = %authorization_id,
            "Bound user accounts to consent"
        );

        Ok(())
    }

    /// 既存の認可リソースにアカウントマッピングを追加する
    pub async fn create_account_mappings(
        &self,
        authorization_id: Uuid,
        account_permissions: &AccountPermissionsMap,
    ) -> ConsentResult<Vec<consent_mapping_model::Model>> {
        let context = "consent_authorization_service::create_account_mappings";
        if account_permissions.is_empty() {
            return Err(validation_error(
                "Account permissions must not be empty",
                context,
            ));
        }

        ConsentAuthorizationRepository::find_by_id(&self.db, authorization_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Authorization resource not found: {}", authorization_id),
                    context,
                )
            })?;

        let mappings = expand_account_permissions(account_permissions);
        let created =
            ConsentMappingRepository::create_many(&self.db, authorization_id, mappings).await?;
        Ok(created)
    }

    /// マッピングを非活性化する。既に inactive でも成功（冪等）
    pub async fn deactivate_account_mappings(&self, mapping_ids: Vec<Uuid>) -> ConsentResult<u64> {
        let rows_affected =
            ConsentMappingRepository::update_status_many(&self.db, mapping_ids, MappingStatus::Inactive)
                .await?;
        Ok(rows_affected)
    }

    pub async fn update_account_mapping_status(
        &self,
        mapping_ids: Vec<Uuid>,
        new_status: MappingStatus,
    ) -> ConsentResult<u64> {
        let rows_affected =
            ConsentMappingRepository::update_status_many(&self.db, mapping_ids, new_status).await?;
        Ok(rows_affected)
    }
}

// src/service/consent_service.rs
use crate::config::ConsentConfig;
use crate::db::DbPool;
use crate::domain::consent_history_model::ConsentHistoryEntry;
use crate::domain::consent_mapping_model::Model as MappingModel;
use crate::domain::consent_model;
use crate::domain::detailed_consent::DetailedConsent;
use crate::domain::mapping_status::MappingStatus;
use crate::dto::consent_dto::{
    AccountPermissionsMap, AmendConsentDto, BulkStatusUpdateFailure, BulkStatusUpdateFilter,
    BulkStatusUpdateResult, ConsentSearchFilter, CreateConsentDto, NewAuthorizationDto,
    NewMappingDto,
};
use crate::error::{ConsentError, ConsentResult};
use crate::repository::consent_attribute_repository::ConsentAttributeRepository;
use crate::repository::consent_authorization_repository::ConsentAuthorizationRepository;
use crate::repository::consent_mapping_repository::ConsentMappingRepository;
use crate::repository::consent_repository::ConsentRepository;
use crate::service::consent_attribute_service::ConsentAttributeService;
use crate::service::consent_audit_service::ConsentAuditService;
use crate::service::consent_authorization_service::{
    expand_account_permissions, ConsentAuthorizationService,
};
use crate::service::consent_history_service::ConsentHistoryService;
use crate::service::token_revocation::TokenRevoker;
use crate::utils::error_helper::{
    conflict_error, convert_validation_errors, not_found_error, validation_error,
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, TransactionTrait};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 内部検索で全件を対象にするための上限（Postgres の bigint に収まる値）
const NO_PAGE_LIMIT: u64 = i64::MAX as u64;

/// 認可リソース1件分のマッピング付け替え計画
#[derive(Debug, Default)]
struct MappingChangePlan {
    to_add: Vec<NewMappingDto>,
    to_deactivate: Vec<Uuid>,
}

/// 要求された (アカウント, 権限) 集合と現在の active マッピングの
/// 集合差分を取る。適用後の active 集合は要求集合と正確に一致する
fn plan_mapping_changes(
    existing: &[&MappingModel],
    requested: &AccountPermissionsMap,
) -> MappingChangePlan {
    let requested_pairs: HashSet<(String, String)> = requested
        .iter()
        .flat_map(|(account_id, permissions)| {
            permissions
                .iter()
                .map(move |p| (account_id.clone(), p.clone()))
        })
        .collect();

    let mut plan = MappingChangePlan::default();
    let mut already_active: HashSet<(String, String)> = HashSet::new();

    for mapping in existing {
        if mapping.mapping_status != MappingStatus::Active.as_str() {
            continue;
        }
        let pair = (mapping.account_id.clone(), mapping.permission.clone());
        if requested_pairs.contains(&pair) {
            already_active.insert(pair);
        } else {
            plan.to_deactivate.push(mapping.id);
        }
    }

    for (account_id, permission) in requested_pairs {
        if !already_active.contains(&(account_id.clone(), permission.clone())) {
            plan.to_add.push(NewMappingDto {
                account_id,
                permission,
                resource: None,
            });
        }
    }

    plan
}

/// 同意ライフサイクルマネージャ。作成・状態遷移・失効・再認可・修正・検索を
/// 単一同意=単一トランザクションの原則で調停する
pub struct ConsentService {
    db: DbPool,
    config: ConsentConfig,
    audit_service: Arc<ConsentAuditService>,
    history_service: Arc<ConsentHistoryService>,
    attribute_service: Arc<ConsentAttributeService>,
    authorization_service: Arc<ConsentAuthorizationService>,
    token_revoker: Arc<dyn TokenRevoker>,
}

impl ConsentService {
    pub fn new(db: DbPool, config: ConsentConfig, token_revoker: Arc<dyn TokenRevoker>) -> Self {
        let audit_service = Arc::new(ConsentAuditService::new(db.clone()));
        let history_service = Arc::new(ConsentHistoryService::new(db.clone()));
        let attribute_service = Arc::new(ConsentAttributeService::new(db.clone()));
        let authorization_service = Arc::new(ConsentAuthorizationService::new(
            db.clone(),
            audit_service.clone(),
        ));
        Self {
            db,
            config,
            audit_service,
            history_service,
            attribute_service,
            authorization_service,
            token_revoker,
        }
    }

    pub fn audit_service(&self) -> &Arc<ConsentAuditService> {
        &self.audit_service
    }

    pub fn attribute_service(&self) -> &Arc<ConsentAttributeService> {
        &self.attribute_service
    }

    pub fn authorization_service(&self) -> &Arc<ConsentAuthorizationService> {
        &self.authorization_service
    }

    // --- 作成 ---

    /// 同意を作成する。implicit_authorization が真なら認可リソースを
    /// 1件併せて作成する（その場合 status / type は必須）
    pub async fn create_authorizable_consent(
        &self,
        payload: &CreateConsentDto,
        user_id: Option<&str>,
        authorization_status: Option<&str>,
        authorization_type: Option<&str>,
        implicit_authorization: bool,
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::create_authorizable_consent";
        self.validate_create_payload(payload, context)?;

        let mut authorizations = Vec::new();
        if implicit_authorization {
            let status = authorization_status.filter(|s| !s.is_empty()).ok_or_else(|| {
                validation_error(
                    "Authorization status is required for implicit authorization",
                    context,
                )
            })?;
            let auth_type = authorization_type.filter(|s| !s.is_empty()).ok_or_else(|| {
                validation_error(
                    "Authorization type is required for implicit authorization",
                    context,
                )
            })?;
            authorizations.push(NewAuthorizationDto {
                authorization_status: status.to_string(),
                authorization_type: auth_type.to_string(),
                user_id: user_id.map(|u| u.to_string()),
            });
        }

        let txn = self.db.begin().await?;
        let detailed = self
            .create_consent_in_txn(&txn, payload, user_id, &authorizations)
            .await?;
        txn.commit().await?;

        tracing::info!(
            consent_id = %detailed.consent_id(),
            client_id = %detailed.consent.client_id,
            "Created consent"
        );

        Ok(detailed)
    }

    /// 複数の認可リソースを伴う同意作成（マルチパーティ同意など）
    pub async fn create_consent_with_authorizations(
        &self,
        payload: &CreateConsentDto,
        user_id: Option<&str>,
        authorizations: &[NewAuthorizationDto],
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::create_consent_with_authorizations";
        self.validate_create_payload(payload, context)?;
        for authorization in authorizations {
            authorization
                .validate()
                .map_err(|e| convert_validation_errors(e, context))?;
        }

        let txn = self.db.begin().await?;
        let detailed = self
            .create_consent_in_txn(&txn, payload, user_id, authorizations)
            .await?;
        txn.commit().await?;

        tracing::info!(
            consent_id = %detailed.consent_id(),
            authorization_count = authorizations.len(),
            "Created consent with authorizations"
        );

        Ok(detailed)
    }

    /// 排他的同意の作成。同一 (org, client, type, user) で applicable 状態にある
    /// 既存同意を new_existing_status へ送り、そのマッピングを非活性化した上で
    /// 新しい同意を作成する。全体が1トランザクション
    #[allow(clippy::too_many_arguments)]
    pub async fn create_exclusive_consent(
        &self,
        payload: &CreateConsentDto,
        user_id: &str,
        authorization_status: &str,
        authorization_type: &str,
        applicable_existing_status: &str,
        new_existing_status: &str,
        implicit_authorization: bool,
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::create_exclusive_consent";
        self.validate_create_payload(payload, context)?;
        if user_id.is_empty() {
            return Err(validation_error("User ID must not be empty", context));
        }
        if applicable_existing_status.is_empty() || new_existing_status.is_empty() {
            return Err(validation_error(
                "Applicable and new statuses for existing consents must not be empty",
                context,
            ));
        }
        if implicit_authorization && (authorization_status.is_empty() || authorization_type.is_empty())
        {
            return Err(validation_error(
                "Authorization status and type are required for implicit authorization",
                context,
            ));
        }

        let txn = self.db.begin().await?;

        self.supersede_existing_consents(
            &txn,
            payload,
            user_id,
            applicable_existing_status,
            new_existing_status,
        )
        .await?;

        let mut authorizations = Vec::new();
        if implicit_authorization {
            authorizations.push(NewAuthorizationDto {
                authorization_status: authorization_status.to_string(),
                authorization_type: authorization_type.to_string(),
                user_id: Some(user_id.to_string()),
            });
        }
        let detailed = self
            .create_consent_in_txn(&txn, payload, Some(user_id), &authorizations)
            .await?;

        txn.commit().await?;

        tracing::info!(
            consent_id = %detailed.consent_id(),
            user_id = %user_id,
            "Created exclusive consent"
        );

        Ok(detailed)
    }

    // --- 取得 ---

    pub async fn get_consent(&self, consent_id: Uuid) -> ConsentResult<consent_model::Model> {
        ConsentRepository::find_by_id(&self.db, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Consent not found: {}", consent_id),
                    "consent_service::get_consent",
                )
            })
    }

    pub async fn get_consent_with_attributes(
        &self,
        consent_id: Uuid,
    ) -> ConsentResult<(consent_model::Model, HashMap<String, String>)> {
        let consent = self.get_consent(consent_id).await?;
        let attributes = ConsentAttributeRepository::find_by_consent_id(&self.db, consent_id)
            .await?
            .into_iter()
            .map(|a| (a.attribute_key, a.attribute_value))
            .collect();
        Ok((consent, attributes))
    }

    pub async fn get_detailed_consent(&self, consent_id: Uuid) -> ConsentResult<DetailedConsent> {
        let consent = ConsentRepository::find_by_id(&self.db, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(
                    &format!("Consent not found: {}", consent_id),
                    "consent_service::get_detailed_consent",
                )
            })?;
        Self::hydrate_detailed(&self.db, consent).await
    }

    // --- 状態遷移 ---

    /// 同意の状態を更新する。同一状態への遷移も受理され、監査行が追記される
    pub async fn update_consent_status(
        &self,
        consent_id: Uuid,
        new_status: &str,
        user_id: Option<&str>,
        reason: Option<&str>,
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::update_consent_status";
        if new_status.is_empty() {
            return Err(validation_error("New status must not be empty", context));
        }

        let txn = self.db.begin().await?;

        let consent = ConsentRepository::find_by_id(&txn, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(&format!("Consent not found: {}", consent_id), context)
            })?;

        let rows_affected = ConsentRepository::update_status_guarded(
            &txn,
            consent_id,
            &consent.current_status,
            new_status,
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
                new_status,
                Some(&consent.current_status),
                user_id,
                reason.or(Some("Consent status updated")),
            )
            .await?;

        let updated = ConsentRepository::find_by_id(&txn, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(&format!("Consent not found: {}", consent_id), context)
            })?;
        let detailed = Self::hydrate_detailed(&txn, updated).await?;

        txn.commit().await?;

        tracing::info!(
            consent_id = %consent_id,
            previous_status = %consent.current_status,
            new_status = %new_status,
            "Updated consent status"
        );

        Ok(detailed)
    }

    /// フィルタに一致する同意を一括遷移する。同意単位でコミットされ、
    /// 失敗した同意は結果に失敗として残る（全体ロールバックはしない）
    pub async fn bulk_update_consent_status(
        &self,
        filter: &BulkStatusUpdateFilter,
    ) -> ConsentResult<BulkStatusUpdateResult> {
        let context = "consent_service::bulk_update_consent_status";
        if filter.org_id.is_empty()
            || filter.client_id.is_empty()
            || filter.consent_type.is_empty()
            || filter.new_status.is_empty()
        {
            return Err(validation_error(
                "Org ID, client ID, consent type and new status must not be empty",
                context,
            ));
        }
        if filter.applicable_statuses.is_empty() {
            return Err(validation_error(
                "Applicable statuses must not be empty",
                context,
            ));
        }

        let consents = self
            .find_applicable_consents(
                &filter.org_id,
                &filter.client_id,
                &filter.consent_type,
                filter.user_id.as_deref(),
                &filter.applicable_statuses,
            )
            .await?;

        let mut result = BulkStatusUpdateResult::default();
        let reason = filter.reason.as_deref().unwrap_or("Bulk consent status update");

        for consent in consents {
            let outcome = self
                .transition_consent(
                    consent.id,
                    &filter.applicable_statuses,
                    &filter.new_status,
                    filter.user_id.as_deref(),
                    reason,
                )
                .await;
            match outcome {
                Ok(()) => result.updated.push(consent.id),
                Err(error) => {
                    tracing::warn!(
                        consent_id = %consent.id,
                        kind = error.kind(),
                        "Bulk status update skipped a consent"
                    );
                    result.failures.push(BulkStatusUpdateFailure {
                        consent_id: consent.id,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            updated = result.updated.len(),
            failed = result.failures.len(),
            new_status = %filter.new_status,
            "Completed bulk consent status update"
        );

        Ok(result)
    }

    // --- 失効 ---

    /// 同意を失効させる。到達可能な全マッピングを非活性化し、
    /// コミット後にベストエフォートでトークンを失効する
    pub async fn revoke_consent(
        &self,
        consent_id: Uuid,
        revoked_status: &str,
        user_id: Option<&str>,
        reason: Option<&str>,
        should_revoke_tokens: bool,
    ) -> ConsentResult<DetailedConsent> {
        self.revoke_internal(
            consent_id,
            revoked_status,
            user_id,
            reason.unwrap_or("Consent revoked"),
            should_revoke_tokens,
            None,
        )
        .await
    }

    /// (org, client, type, user) で applicable 状態にある既存同意を
    /// すべて失効させる。同意単位でコミットされる
    #[allow(clippy::too_many_arguments)]
    pub async fn revoke_existing_applicable_consents(
        &self,
        org_id: &str,
        client_id: &str,
        user_id: &str,
        consent_type: &str,
        applicable_status: &str,
        revoked_status: &str,
        should_revoke_tokens: bool,
    ) -> ConsentResult<BulkStatusUpdateResult> {
        let context = "consent_service::revoke_existing_applicable_consents";
        if org_id.is_empty()
            || client_id.is_empty()
            || user_id.is_empty()
            || consent_type.is_empty()
            || applicable_status.is_empty()
            || revoked_status.is_empty()
        {
            return Err(validation_error(
                "All revocation filter parameters must not be empty",
                context,
            ));
        }

        let consents = self
            .find_applicable_consents(
                org_id,
                client_id,
                consent_type,
                Some(user_id),
                std::slice::from_ref(&applicable_status.to_string()),
            )
            .await?;

        let mut result = BulkStatusUpdateResult::default();
        for consent in consents {
            let outcome = self
                .revoke_internal(
                    consent.id,
                    revoked_status,
                    Some(user_id),
                    "Revoke existing applicable consents",
                    should_revoke_tokens,
                    Some(applicable_status),
                )
                .await;
            match outcome {
                Ok(_) => result.updated.push(consent.id),
                Err(error) => {
                    tracing::warn!(
                        consent_id = %consent.id,
                        kind = error.kind(),
                        "Applicable consent revocation skipped a consent"
                    );
                    result.failures.push(BulkStatusUpdateFailure {
                        consent_id: consent.id,
                        error,
                    });
                }
            }
        }

        Ok(result)
    }

    // --- 再認可 ---

    /// 既存の認可リソースのマッピング集合を要求集合へ付け替え、
    /// 同意を expected_status から new_status へ遷移させる。
    /// 競合する再認可のうち後から来た方は Conflict で拒否される
    pub async fn reauthorize_existing_auth_resource(
        &self,
        consent_id: Uuid,
        authorization_id: Uuid,
        user_id: &str,
        account_permissions: &AccountPermissionsMap,
        expected_status: &str,
        new_status: &str,
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::reauthorize_existing_auth_resource";
        if user_id.is_empty() || expected_status.is_empty() || new_status.is_empty() {
            return Err(validation_error(
                "User ID and statuses must not be empty",
                context,
            ));
        }
        if account_permissions.is_empty() {
            return Err(validation_error(
                "Account permissions must not be empty",
                context,
            ));
        }

        let txn = self.db.begin().await?;

        let prior = self.load_detailed_in_txn(&txn, consent_id, context).await?;
        if !prior
            .authorizations
            .iter()
            .any(|a| a.id == authorization_id)
        {
            return Err(validation_error(
                "Authorization resource does not belong to the consent",
                context,
            ));
        }

        let existing = prior.mappings_for_authorization(authorization_id);
        let plan = plan_mapping_changes(&existing, account_permissions);
        ConsentMappingRepository::create_many(&txn, authorization_id, plan.to_add).await?;
        ConsentMappingRepository::update_status_many(
            &txn,
            plan.to_deactivate,
            MappingStatus::Inactive,
        )
        .await?;

        let rows_affected = ConsentRepository::update_status_guarded(
            &txn,
            consent_id,
            expected_status,
            new_status,
        )
        .await?;
        if rows_affected == 0 {
            return Err(conflict_error(
                &format!(
                    "Consent {} is no longer in status {}",
                    consent_id, expected_status
                ),
                context,
            ));
        }

        self.audit_service
            .record(
                &txn,
                consent_id,
                new_status,
                Some(&prior.consent.current_status),
                Some(user_id),
                Some("Consent re-authorization"),
            )
            .await?;

        let detailed = self.reload_detailed_in_txn(&txn, consent_id, context).await?;
        txn.commit().await?;

        tracing::info!(
            consent_id = %consent_id,
            authorization_id = %authorization_id,
            "Re-authorized existing authorization resource"
        );

        Ok(detailed)
    }

    /// ユーザーの既存認可リソースを退役させ、新しい認可リソースの下で
    /// 要求されたマッピング集合を作り直す再認可
    #[allow(clippy::too_many_arguments)]
    pub async fn reauthorize_consent_with_new_auth_resource(
        &self,
        consent_id: Uuid,
        user_id: &str,
        account_permissions: &AccountPermissionsMap,
        expected_status: &str,
        new_status: &str,
        new_existing_authorization_status: &str,
        new_authorization_status: &str,
        new_authorization_type: &str,
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::reauthorize_consent_with_new_auth_resource";
        if user_id.is_empty()
            || expected_status.is_empty()
            || new_status.is_empty()
            || new_existing_authorization_status.is_empty()
            || new_authorization_status.is_empty()
            || new_authorization_type.is_empty()
        {
            return Err(validation_error(
                "User ID and all statuses must not be empty",
                context,
            ));
        }
        if account_permissions.is_empty() {
            return Err(validation_error(
                "Account permissions must not be empty",
                context,
            ));
        }

        let txn = self.db.begin().await?;

        let prior = self.load_detailed_in_txn(&txn, consent_id, context).await?;

        // ユーザーの既存認可を退役させ、そのマッピングを非活性化する
        let user_authorizations: Vec<Uuid> = prior
            .authorizations
            .iter()
            .filter(|a| a.user_id.as_deref() == Some(user_id))
            .map(|a| a.id)
            .collect();
        for authorization_id in &user_authorizations {
            ConsentAuthorizationRepository::update_status(
                &txn,
                *authorization_id,
                new_existing_authorization_status,
            )
            .await?;
        }
        let retired_mapping_ids: Vec<Uuid> = prior
            .mappings
            .iter()
            .filter(|m| user_authorizations.contains(&m.authorization_id))
            .map(|m| m.id)
            .collect();
        ConsentMappingRepository::update_status_many(
            &txn,
            retired_mapping_ids,
            MappingStatus::Inactive,
        )
        .await?;

        let new_authorization = ConsentAuthorizationRepository::create(
            &txn,
            consent_id,
            &NewAuthorizationDto {
                authorization_status: new_authorization_status.to_string(),
                authorization_type: new_authorization_type.to_string(),
                user_id: Some(user_id.to_string()),
            },
        )
        .await?;
        ConsentMappingRepository::create_many(
            &txn,
            new_authorization.id,
            expand_account_permissions(account_permissions),
        )
        .await?;

        let rows_affected = ConsentRepository::update_status_guarded(
            &txn,
            consent_id,
            expected_status,
            new_status,
        )
        .await?;
        if rows_affected == 0 {
            return Err(conflict_error(
                &format!(
                    "Consent {} is no longer in status {}",
                    consent_id, expected_status
                ),
                context,
            ));
        }

        self.audit_service
            .record(
                &txn,
                consent_id,
                new_status,
                Some(&prior.consent.current_status),
                Some(user_id),
                Some("Consent re-authorization"),
            )
            .await?;

        let detailed = self.reload_detailed_in_txn(&txn, consent_id, context).await?;
        txn.commit().await?;

        tracing::info!(
            consent_id = %consent_id,
            new_authorization_id = %new_authorization.id,
            "Re-authorized consent with a new authorization resource"
        );

        Ok(detailed)
    }

    // --- 修正 ---

    /// 同意の修正。レシート・有効期限・マッピング集合・属性を更新し、
    /// 同一状態の監査行と修正履歴の差分を残す。状態は変化しない
    pub async fn amend_detailed_consent(
        &self,
        consent_id: Uuid,
        payload: &AmendConsentDto,
    ) -> ConsentResult<DetailedConsent> {
        self.amend_internal(consent_id, payload, &[]).await
    }

    /// 修正と同時に新しい認可リソース（と配下のマッピング）を追加する
    pub async fn amend_detailed_consent_with_bulk_auth(
        &self,
        consent_id: Uuid,
        payload: &AmendConsentDto,
        new_authorizations: &[(NewAuthorizationDto, Vec<NewMappingDto>)],
    ) -> ConsentResult<DetailedConsent> {
        self.amend_internal(consent_id, payload, new_authorizations)
            .await
    }

    // --- 検索 ---

    /// 詳細同意の複合検索。結果は updated_at 降順、ページサイズは設定で
    /// 上限が課される。ハイドレーションはページ単位の一括取得で行う
    pub async fn search_detailed_consents(
        &self,
        filter: &ConsentSearchFilter,
    ) -> ConsentResult<Vec<DetailedConsent>> {
        let context = "consent_service::search_detailed_consents";
        if filter.org_id.is_empty() {
            return Err(validation_error("Org ID must not be empty", context));
        }

        let consent_ids_for_users = match &filter.user_ids {
            Some(user_ids) if !user_ids.is_empty() => {
                let ids =
                    ConsentAuthorizationRepository::find_consent_ids_by_users(&self.db, user_ids)
                        .await?;
                if ids.is_empty() {
                    // 該当ユーザーの同意が存在しない
                    return Ok(Vec::new());
                }
                Some(ids)
            }
            _ => None,
        };

        let limit = self.config.clamp_page_size(filter.limit);
        let offset = filter.offset.unwrap_or(0);
        let consents =
            ConsentRepository::search(&self.db, filter, consent_ids_for_users, limit, offset)
                .await?;

        Self::hydrate_many(&self.db, consents).await
    }

    /// 有効期限切れ候補の同意を取得する（定期失効ジョブ用）
    pub async fn get_consents_eligible_for_expiration(
        &self,
        statuses: &[String],
    ) -> ConsentResult<Vec<DetailedConsent>> {
        if statuses.is_empty() {
            return Err(validation_error(
                "Statuses must not be empty",
                "consent_service::get_consents_eligible_for_expiration",
            ));
        }
        let consents = ConsentRepository::find_eligible_for_expiration(
            &self.db,
            statuses,
            Utc::now().timestamp(),
        )
        .await?;
        Self::hydrate_many(&self.db, consents).await
    }

    /// 修正履歴を新しい順に再構築して返す
    pub async fn get_amendment_history(
        &self,
        consent_id: Uuid,
        history_ids: Option<Vec<Uuid>>,
    ) -> ConsentResult<Vec<ConsentHistoryEntry>> {
        let current = self.get_detailed_consent(consent_id).await?;
        self.history_service
            .get_amendment_history(&current, history_ids)
            .await
    }

    // --- internal ---

    fn validate_create_payload(
        &self,
        payload: &CreateConsentDto,
        context: &str,
    ) -> ConsentResult<()> {
        payload
            .validate()
            .map_err(|e| convert_validation_errors(e, context))?;
        if payload.receipt.is_null() {
            return Err(validation_error("Receipt must not be null", context));
        }
        if payload.validity_period < 0 {
            return Err(validation_error(
                "Validity period must not be negative",
                context,
            ));
        }
        Ok(())
    }

    async fn create_consent_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        payload: &CreateConsentDto,
        user_id: Option<&str>,
        authorizations: &[NewAuthorizationDto],
    ) -> ConsentResult<DetailedConsent> {
        let consent = ConsentRepository::create(conn, payload).await?;

        let attributes = payload.attributes.clone().unwrap_or_default();
        if !attributes.is_empty() {
            ConsentAttributeRepository::upsert_many(conn, consent.id, &attributes).await?;
        }

        let mut created_authorizations = Vec::with_capacity(authorizations.len());
        for authorization in authorizations {
            let created =
                ConsentAuthorizationRepository::create(conn, consent.id, authorization).await?;
            created_authorizations.push(created);
        }

        self.audit_service
            .record(
                conn,
                consent.id,
                &consent.current_status,
                None,
                user_id,
                Some("Consent created"),
            )
            .await?;

        Ok(DetailedConsent::new(
            consent,
            created_authorizations,
            Vec::new(),
            attributes,
        ))
    }

    /// 排他的同意の作成時に、同一 (org, client, type, user) の既存同意を
    /// 退役させる。呼び出し元のトランザクション内で実行される
    async fn supersede_existing_consents<C: ConnectionTrait>(
        &self,
        conn: &C,
        payload: &CreateConsentDto,
        user_id: &str,
        applicable_existing_status: &str,
        new_existing_status: &str,
    ) -> ConsentResult<()> {
        let context = "consent_service::supersede_existing_consents";

        let consent_ids_for_user = ConsentAuthorizationRepository::find_consent_ids_by_users(
            conn,
            std::slice::from_ref(&user_id.to_string()),
        )
        .await?;
        if consent_ids_for_user.is_empty() {
            return Ok(());
        }

        let filter = ConsentSearchFilter {
            org_id: payload.org_id.clone(),
            client_ids: Some(vec![payload.client_id.clone()]),
            consent_types: Some(vec![payload.consent_type.clone()]),
            statuses: Some(vec![applicable_existing_status.to_string()]),
            ..Default::default()
        };
        let existing =
            ConsentRepository::search(conn, &filter, Some(consent_ids_for_user), NO_PAGE_LIMIT, 0)
                .await?;

        for consent in &existing {
            let rows_affected = ConsentRepository::update_status_guarded(
                conn,
                consent.id,
                applicable_existing_status,
                new_existing_status,
            )
            .await?;
            if rows_affected == 0 {
                return Err(conflict_error(
                    &format!("Consent {} was concurrently modified", consent.id),
                    context,
                ));
            }

            self.audit_service
                .record(
                    conn,
                    consent.id,
                    new_existing_status,
                    Some(applicable_existing_status),
                    Some(user_id),
                    Some("Superseded by a new exclusive consent"),
                )
                .await?;
        }

        let consent_ids: Vec<Uuid> = existing.iter().map(|c| c.id).collect();
        let authorizations =
            ConsentAuthorizationRepository::find_by_consent_ids(conn, consent_ids).await?;
        let mappings = ConsentMappingRepository::find_by_authorization_ids(
            conn,
            authorizations.iter().map(|a| a.id).collect(),
        )
        .await?;
        ConsentMappingRepository::update_status_many(
            conn,
            mappings.into_iter().map(|m| m.id).collect(),
            MappingStatus::Inactive,
        )
        .await?;

        if !existing.is_empty() {
            tracing::info!(
                superseded = existing.len(),
                user_id = %user_id,
                "Superseded existing consents for an exclusive consent"
            );
        }

        Ok(())
    }

    /// バルク遷移の1同意分。同意単位の独立したトランザクションで実行される
    async fn transition_consent(
        &self,
        consent_id: Uuid,
        applicable_statuses: &[String],
        new_status: &str,
        user_id: Option<&str>,
        reason: &str,
    ) -> ConsentResult<()> {
        let context = "consent_service::transition_consent";
        let txn = self.db.begin().await?;

        let consent = ConsentRepository::find_by_id(&txn, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(&format!("Consent not found: {}", consent_id), context)
            })?;
        if !applicable_statuses.contains(&consent.current_status) {
            return Err(conflict_error(
                &format!(
                    "Consent {} is no longer in an applicable status",
                    consent_id
                ),
                context,
            ));
        }

        let rows_affected = ConsentRepository::update_status_guarded(
            &txn,
            consent_id,
            &consent.current_status,
            new_status,
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
                new_status,
                Some(&consent.current_status),
                user_id,
                Some(reason),
            )
            .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn revoke_internal(
        &self,
        consent_id: Uuid,
        revoked_status: &str,
        user_id: Option<&str>,
        reason: &str,
        should_revoke_tokens: bool,
        required_current_status: Option<&str>,
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::revoke_consent";
        if revoked_status.is_empty() {
            return Err(validation_error("Revoked status must not be empty", context));
        }

        let txn = self.db.begin().await?;

        let prior = self.load_detailed_in_txn(&txn, consent_id, context).await?;
        let current_status = prior.consent.current_status.clone();

        if let Some(required) = required_current_status {
            if current_status != required {
                return Err(conflict_error(
                    &format!(
                        "Consent {} is no longer in status {}",
                        consent_id, required
                    ),
                    context,
                ));
            }
        }
        if current_status == revoked_status {
            return Err(conflict_error(
                &format!("Consent {} is already in status {}", consent_id, revoked_status),
                context,
            ));
        }
        if self.config.is_terminal_status(&current_status) {
            return Err(conflict_error(
                &format!(
                    "Consent {} is in terminal status {} and cannot be revoked",
                    consent_id, current_status
                ),
                context,
            ));
        }

        // トークン失効に使うユーザーはコミット前に確定させる
        let revocation_user = if should_revoke_tokens {
            let bound_user = prior.primary_user_id();
            match (user_id, bound_user) {
                (Some(requested), Some(bound)) if requested != bound => {
                    return Err(validation_error(
                        "User ID does not match the user bound to the consent",
                        context,
                    ));
                }
                (Some(requested), _) => Some(requested.to_string()),
                (None, Some(bound)) => Some(bound.to_string()),
                (None, None) => {
                    return Err(validation_error(
                        "Cannot revoke tokens for a consent with no bound user",
                        context,
                    ));
                }
            }
        } else {
            None
        };

        let rows_affected = ConsentRepository::update_status_guarded(
            &txn,
            consent_id,
            &current_status,
            revoked_status,
        )
        .await?;
        if rows_affected == 0 {
            return Err(conflict_error(
                &format!("Consent {} was concurrently modified", consent_id),
                context,
            ));
        }

        ConsentMappingRepository::update_status_many(
            &txn,
            prior.mapping_ids(),
            MappingStatus::Inactive,
        )
        .await?;

        let audit_record = self
            .audit_service
            .record(
                &txn,
                consent_id,
                revoked_status,
                Some(&current_status),
                user_id,
                Some(reason),
            )
            .await?;

        let detailed = self.reload_detailed_in_txn(&txn, consent_id, context).await?;

        // 失効前の状態も修正履歴として残す
        if self.config.amendment_history_enabled {
            self.history_service
                .store_amendment_history(&txn, audit_record.id, reason, &prior, &detailed)
                .await?;
        }

        txn.commit().await?;

        tracing::info!(
            consent_id = %consent_id,
            previous_status = %current_status,
            revoked_status = %revoked_status,
            "Revoked consent"
        );

        // コミット後のベストエフォート。失敗しても失効自体は巻き戻さない
        if let Some(revocation_user) = revocation_user {
            if let Err(error) = self
                .token_revoker
                .revoke_tokens_for_consent(&detailed, &revocation_user)
                .await
            {
                tracing::error!(
                    consent_id = %consent_id,
                    error = %error,
                    "Token revocation failed after consent revocation"
                );
            }
        }

        Ok(detailed)
    }

    async fn amend_internal(
        &self,
        consent_id: Uuid,
        payload: &AmendConsentDto,
        new_authorizations: &[(NewAuthorizationDto, Vec<NewMappingDto>)],
    ) -> ConsentResult<DetailedConsent> {
        let context = "consent_service::amend_detailed_consent";
        if payload.receipt.is_none() && payload.validity_period.is_none() {
            return Err(validation_error(
                "Either receipt or validity period is required for an amendment",
                context,
            ));
        }
        if let Some(receipt) = &payload.receipt {
            if receipt.is_null() {
                return Err(validation_error("Receipt must not be null", context));
            }
        }
        if payload.user_id.is_empty() {
            return Err(validation_error("User ID must not be empty", context));
        }
        if payload.account_permissions.is_empty() {
            return Err(validation_error(
                "Account permissions must not be empty",
                context,
            ));
        }
        for (authorization, _) in new_authorizations {
            authorization
                .validate()
                .map_err(|e| convert_validation_errors(e, context))?;
        }

        let txn = self.db.begin().await?;

        let prior = self.load_detailed_in_txn(&txn, consent_id, context).await?;
        if !prior
            .authorizations
            .iter()
            .any(|a| a.id == payload.authorization_id)
        {
            return Err(validation_error(
                "Authorization resource does not belong to the consent",
                context,
            ));
        }

        if let Some(receipt) = &payload.receipt {
            ConsentRepository::update_receipt(&txn, consent_id, receipt).await?;
        }
        if let Some(validity_period) = payload.validity_period {
            if validity_period < 0 {
                return Err(validation_error(
                    "Validity period must not be negative",
                    context,
                ));
            }
            ConsentRepository::update_validity_period(&txn, consent_id, validity_period).await?;
        }

        let existing = prior.mappings_for_authorization(payload.authorization_id);
        let plan = plan_mapping_changes(&existing, &payload.account_permissions);
        ConsentMappingRepository::create_many(&txn, payload.authorization_id, plan.to_add).await?;
        ConsentMappingRepository::update_status_many(
            &txn,
            plan.to_deactivate,
            MappingStatus::Inactive,
        )
        .await?;

        if !payload.attributes.is_empty() {
            ConsentAttributeRepository::upsert_many(&txn, consent_id, &payload.attributes).await?;
        }

        for (authorization, mappings) in new_authorizations {
            let created =
                ConsentAuthorizationRepository::create(&txn, consent_id, authorization).await?;
            ConsentMappingRepository::create_many(&txn, created.id, mappings.clone()).await?;
        }

        // 修正は状態を変えない。同一状態の監査行を追記する
        let audit_record = self
            .audit_service
            .record(
                &txn,
                consent_id,
                &prior.consent.current_status,
                Some(&prior.consent.current_status),
                Some(&payload.user_id),
                Some("Consent amended"),
            )
            .await?;

        let detailed = self.reload_detailed_in_txn(&txn, consent_id, context).await?;

        if self.config.amendment_history_enabled {
            self.history_service
                .store_amendment_history(&txn, audit_record.id, "Consent amended", &prior, &detailed)
                .await?;
        }

        txn.commit().await?;

        tracing::info!(
            consent_id = %consent_id,
            new_authorization_count = new_authorizations.len(),
            "Amended consent"
        );

        Ok(detailed)
    }

    async fn find_applicable_consents(
        &self,
        org_id: &str,
        client_id: &str,
        consent_type: &str,
        user_id: Option<&str>,
        applicable_statuses: &[String],
    ) -> ConsentResult<Vec<consent_model::Model>> {
        let consent_ids_for_user = match user_id {
            Some(user_id) => {
                let ids = ConsentAuthorizationRepository::find_consent_ids_by_users(
                    &self.db,
                    std::slice::from_ref(&user_id.to_string()),
                )
                .await?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                Some(ids)
            }
            None => None,
        };

        let filter = ConsentSearchFilter {
            org_id: org_id.to_string(),
            client_ids: Some(vec![client_id.to_string()]),
            consent_types: Some(vec![consent_type.to_string()]),
            statuses: Some(applicable_statuses.to_vec()),
            ..Default::default()
        };
        let consents =
            ConsentRepository::search(&self.db, &filter, consent_ids_for_user, NO_PAGE_LIMIT, 0)
                .await?;
        Ok(consents)
    }

    async fn load_detailed_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        consent_id: Uuid,
        context: &str,
    ) -> ConsentResult<DetailedConsent> {
        let consent = ConsentRepository::find_by_id(conn, consent_id)
            .await?
            .ok_or_else(|| {
                not_found_error(&format!("Consent not found: {}", consent_id), context)
            })?;
        Self::hydrate_detailed(conn, consent).await
    }

    async fn reload_detailed_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        consent_id: Uuid,
        context: &str,
    ) -> ConsentResult<DetailedConsent> {
        self.load_detailed_in_txn(conn, consent_id, context).await
    }

    async fn hydrate_detailed<C: ConnectionTrait>(
        conn: &C,
        consent: consent_model::Model,
    ) -> ConsentResult<DetailedConsent> {
        let mut hydrated = Self::hydrate_many(conn, vec![consent]).await?;
        hydrated.pop().ok_or_else(|| {
            ConsentError::Unknown("Hydration returned no aggregate".to_string())
        })
    }

    /// ページ単位の一括ハイドレーション。認可・マッピング・属性を
    /// それぞれ1クエリで取得して同意ごとに束ねる（N+1回避）
    async fn hydrate_many<C: ConnectionTrait>(
        conn: &C,
        consents: Vec<consent_model::Model>,
    ) -> ConsentResult<Vec<DetailedConsent>> {
        if consents.is_empty() {
            return Ok(Vec::new());
        }

        let consent_ids: Vec<Uuid> = consents.iter().map(|c| c.id).collect();
        let authorizations =
            ConsentAuthorizationRepository::find_by_consent_ids(conn, consent_ids.clone()).await?;
        let mappings = ConsentMappingRepository::find_by_authorization_ids(
            conn,
            authorizations.iter().map(|a| a.id).collect(),
        )
        .await?;
        let attributes =
            ConsentAttributeRepository::find_by_consent_ids(conn, consent_ids).await?;

        let consent_of_authorization: HashMap<Uuid, Uuid> = authorizations
            .iter()
            .map(|a| (a.id, a.consent_id))
            .collect();

        let mut authorizations_by_consent: HashMap<Uuid, Vec<_>> = HashMap::new();
        for authorization in authorizations {
            authorizations_by_consent
                .entry(authorization.consent_id)
                .or_default()
                .push(authorization);
        }

        let mut mappings_by_consent: HashMap<Uuid, Vec<_>> = HashMap::new();
        for mapping in mappings {
            if let Some(consent_id) = consent_of_authorization.get(&mapping.authorization_id) {
                mappings_by_consent
                    .entry(*consent_id)
                    .or_default()
                    .push(mapping);
            }
        }

        let mut attributes_by_consent: HashMap<Uuid, HashMap<String, String>> = HashMap::new();
        for attribute in attributes {
            attributes_by_consent
                .entry(attribute.consent_id)
                .or_default()
                .insert(attribute.attribute_key, attribute.attribute_value);
        }

        Ok(consents
            .into_iter()
            .map(|consent| {
                let consent_id = consent.id;
                DetailedConsent::new(
                    consent,
                    authorizations_by_consent.remove(&consent_id).unwrap_or_default(),
                    mappings_by_consent.remove(&consent_id).unwrap_or_default(),
                    attributes_by_consent.remove(&consent_id).unwrap_or_default(),
                )
            })
            .collect())
    }
}

// tests/consent_revocation_tests.rs
mod common;

use async_trait::async_trait;
use common::db::TestDatabase;
use common::test_data::*;
use consent_core::domain::detailed_consent::DetailedConsent;
use consent_core::domain::mapping_status::MappingStatus;
use consent_core::dto::consent_dto::AuditSearchFilter;
use consent_core::service::token_revocation::TokenRevoker;
use consent_core::{ConsentError, ConsentResult};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 呼び出しを記録するテスト用のトークン失効コラボレータ
struct RecordingRevoker {
    calls: Mutex<Vec<(Uuid, String)>>,
}

#[async_trait]
impl TokenRevoker for RecordingRevoker {
    async fn revoke_tokens_for_consent(
        &self,
        consent: &DetailedConsent,
        user_id: &str,
    ) -> ConsentResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((consent.consent_id(), user_id.to_string()));
        Ok(())
    }
}

/// 常に失敗するトークン失効コラボレータ
struct FailingRevoker;

#[async_trait]
impl TokenRevoker for FailingRevoker {
    async fn revoke_tokens_for_consent(
        &self,
        _consent: &DetailedConsent,
        _user_id: &str,
    ) -> ConsentResult<()> {
        Err(ConsentError::Unknown("revocation backend down".to_string()))
    }
}

async fn create_authorized_consent(
    service: &consent_core::service::consent_service::ConsentService,
) -> DetailedConsent {
    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_authorizable_consent(
            &payload,
            Some("user-1"),
            Some("Created"),
            Some("authorization"),
            true,
        )
        .await
        .unwrap();
    service
        .authorization_service()
        .bind_user_accounts_to_consent(
            created.consent_id(),
            created.authorizations[0].id,
            "user-1",
            &account_permissions(&[("acc-1", &["read", "write"]), ("acc-2", &["read"])]),
            "Authorised",
            AUTHORISED,
        )
        .await
        .unwrap();
    service.get_detailed_consent(created.consent_id()).await.unwrap()
}

#[tokio::test]
async fn revoke_deactivates_all_reachable_mappings() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = create_authorized_consent(&service).await;
    assert_eq!(consent.active_mappings().len(), 3);

    let revoked = service
        .revoke_consent(consent.consent_id(), REVOKED, Some("user-1"), None, false)
        .await
        .unwrap();

    assert_eq!(revoked.consent.current_status, REVOKED);
    assert!(revoked.active_mappings().is_empty());
    assert!(revoked
        .mappings
        .iter()
        .all(|m| m.mapping_status == MappingStatus::Inactive.as_str()));

    let audit = service
        .audit_service()
        .search_audit_records(&AuditSearchFilter {
            consent_id: Some(consent.consent_id()),
            status: Some(REVOKED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].previous_status.as_deref(), Some(AUTHORISED));
}

#[tokio::test]
async fn double_revocation_is_a_conflict() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = create_authorized_consent(&service).await;
    service
        .revoke_consent(consent.consent_id(), REVOKED, Some("user-1"), None, false)
        .await
        .unwrap();

    let second = service
        .revoke_consent(consent.consent_id(), REVOKED, Some("user-1"), None, false)
        .await;
    assert!(matches!(second, Err(ConsentError::Conflict(_))));
}

#[tokio::test]
async fn revoking_missing_consent_is_not_found() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let result = service
        .revoke_consent(Uuid::new_v4(), REVOKED, None, None, false)
        .await;
    assert!(matches!(result, Err(ConsentError::NotFound(_))));
}

#[tokio::test]
async fn revoke_invokes_token_revoker_after_commit() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let revoker = Arc::new(RecordingRevoker {
        calls: Mutex::new(Vec::new()),
    });
    let service = build_service_with_revoker(&db.connection, revoker.clone());

    let consent = create_authorized_consent(&service).await;
    service
        .revoke_consent(consent.consent_id(), REVOKED, Some("user-1"), None, true)
        .await
        .unwrap();

    let calls = revoker.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (consent.consent_id(), "user-1".to_string()));
}

#[tokio::test]
async fn token_revocation_failure_does_not_roll_back_the_revocation() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service_with_revoker(&db.connection, Arc::new(FailingRevoker));

    let consent = create_authorized_consent(&service).await;
    let revoked = service
        .revoke_consent(consent.consent_id(), REVOKED, Some("user-1"), None, true)
        .await
        .unwrap();

    assert_eq!(revoked.consent.current_status, REVOKED);
    let fetched = service.get_consent(consent.consent_id()).await.unwrap();
    assert_eq!(fetched.current_status, REVOKED);
}

#[tokio::test]
async fn revoke_with_mismatched_user_is_a_validation_error() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = create_authorized_consent(&service).await;
    let result = service
        .revoke_consent(consent.consent_id(), REVOKED, Some("intruder"), None, true)
        .await;

    assert!(matches!(result, Err(ConsentError::Validation(_))));
    // 失効は起きていない
    let fetched = service.get_consent(consent.consent_id()).await.unwrap();
    assert_eq!(fetched.current_status, AUTHORISED);
}

#[tokio::test]
async fn revoke_existing_applicable_consents_revokes_per_consent() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let first = create_authorized_consent(&service).await;
    let second = create_authorized_consent(&service).await;
    // 対象外のユーザーの同意は残る
    let payload = create_consent_payload("org-1", "client-1");
    let other_user = service
        .create_authorizable_consent(
            &payload,
            Some("user-2"),
            Some("Created"),
            Some("authorization"),
            true,
        )
        .await
        .unwrap();

    let result = service
        .revoke_existing_applicable_consents(
            "org-1",
            "client-1",
            "user-1",
            "accounts",
            AUTHORISED,
            REVOKED,
            false,
        )
        .await
        .unwrap();

    assert!(result.is_complete_success());
    assert_eq!(result.updated.len(), 2);
    assert!(result.updated.contains(&first.consent_id()));
    assert!(result.updated.contains(&second.consent_id()));

    let untouched = service.get_consent(other_user.consent_id()).await.unwrap();
    assert_eq!(untouched.current_status, AWAITING_AUTHORISATION);
}

// tests/consent_amendment_tests.rs
mod common;

use common::db::TestDatabase;
use common::test_data::*;
use consent_core::domain::detailed_consent::DetailedConsent;
use consent_core::domain::mapping_status::MappingStatus;
use consent_core::dto::consent_dto::{AmendConsentDto, NewMappingDto};
use consent_core::service::consent_service::ConsentService;
use consent_core::ConsentError;
use serde_json::json;
use std::collections::HashMap;

async fn authorized_consent(service: &ConsentService, user_id: &str) -> DetailedConsent {
    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_authorizable_consent(
            &payload,
            Some(user_id),
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
            user_id,
            &account_permissions(&[("acc-1", &["read"]), ("acc-2", &["read"])]),
            "Authorised",
            AUTHORISED,
        )
        .await
        .unwrap();
    service.get_detailed_consent(created.consent_id()).await.unwrap()
}

#[tokio::test]
async fn amendment_replaces_the_mapping_set_exactly() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let authorization_id = consent.authorizations[0].id;

    // acc-2 を落とし、acc-1 に write を足す
    let amended = service
        .amend_detailed_consent(
            consent.consent_id(),
            &AmendConsentDto {
                receipt: Some(json!({"permissions": ["accounts", "balances"]})),
                validity_period: Some(86_400),
                authorization_id,
                account_permissions: account_permissions(&[("acc-1", &["read", "write"])]),
                attributes: HashMap::from([("amended".to_string(), "yes".to_string())]),
                user_id: "user-1".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(amended.consent.validity_period, 86_400);
    // 状態は修正では変わらない
    assert_eq!(amended.consent.current_status, AUTHORISED);

    let active: Vec<(&str, &str)> = amended
        .active_mappings()
        .iter()
        .map(|m| (m.account_id.as_str(), m.permission.as_str()))
        .collect();
    assert_eq!(active.len(), 2);
    assert!(active.contains(&("acc-1", "read")));
    assert!(active.contains(&("acc-1", "write")));

    let deactivated: Vec<&str> = amended
        .mappings
        .iter()
        .filter(|m| m.mapping_status == MappingStatus::Inactive.as_str())
        .map(|m| m.account_id.as_str())
        .collect();
    assert_eq!(deactivated, vec!["acc-2"]);

    assert_eq!(amended.attributes.get("amended").map(String::as_str), Some("yes"));
}

#[tokio::test]
async fn amendment_requires_receipt_or_validity() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let result = service
        .amend_detailed_consent(
            consent.consent_id(),
            &AmendConsentDto {
                receipt: None,
                validity_period: None,
                authorization_id: consent.authorizations[0].id,
                account_permissions: account_permissions(&[("acc-1", &["read"])]),
                attributes: HashMap::new(),
                user_id: "user-1".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(ConsentError::Validation(_))));
}

#[tokio::test]
async fn amendment_history_reconstructs_the_prior_state() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let authorization_id = consent.authorizations[0].id;
    let original_receipt = consent.consent.receipt.clone();

    service
        .amend_detailed_consent(
            consent.consent_id(),
            &AmendConsentDto {
                receipt: Some(json!({"permissions": ["balances"]})),
                validity_period: Some(86_400),
                authorization_id,
                account_permissions: account_permissions(&[("acc-1", &["read"])]),
                attributes: HashMap::new(),
                user_id: "user-1".to_string(),
            },
        )
        .await
        .unwrap();

    let history = service
        .get_amendment_history(consent.consent_id(), None)
        .await
        .unwrap();

    assert_eq!(history.len(), 1);
    let snapshot = &history[0].detailed_consent;
    assert_eq!(snapshot.consent.receipt, original_receipt);
    assert_eq!(snapshot.consent.validity_period, 0);
    // 修正前は acc-1 / acc-2 の両方が active
    assert_eq!(snapshot.active_mappings().len(), 2);
}

#[tokio::test]
async fn two_amendments_yield_two_history_entries_newest_first() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let authorization_id = consent.authorizations[0].id;

    for validity_period in [100i64, 200] {
        service
            .amend_detailed_consent(
                consent.consent_id(),
                &AmendConsentDto {
                    receipt: None,
                    validity_period: Some(validity_period),
                    authorization_id,
                    account_permissions: account_permissions(&[
                        ("acc-1", &["read"]),
                        ("acc-2", &["read"]),
                    ]),
                    attributes: HashMap::new(),
                    user_id: "user-1".to_string(),
                },
            )
            .await
            .unwrap();
    }

    let history = service
        .get_amendment_history(consent.consent_id(), None)
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    // 新しい修正の直前の状態 → validity 100、古い修正の直前 → 0
    assert_eq!(history[0].detailed_consent.consent.validity_period, 100);
    assert_eq!(history[1].detailed_consent.consent.validity_period, 0);
}

#[tokio::test]
async fn amendment_with_bulk_auth_adds_new_authorizations() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let amended = service
        .amend_detailed_consent_with_bulk_auth(
            consent.consent_id(),
            &AmendConsentDto {
                receipt: Some(json!({"permissions": ["accounts"]})),
                validity_period: None,
                authorization_id: consent.authorizations[0].id,
                account_permissions: account_permissions(&[
                    ("acc-1", &["read"]),
                    ("acc-2", &["read"]),
                ]),
                attributes: HashMap::new(),
                user_id: "user-1".to_string(),
            },
            &[(
                new_authorization(Some("user-2")),
                vec![NewMappingDto {
                    account_id: "acc-9".to_string(),
                    permission: "read".to_string(),
                    resource: None,
                }],
            )],
        )
        .await
        .unwrap();

    assert_eq!(amended.authorizations.len(), 2);
    let new_auth = amended
        .authorizations
        .iter()
        .find(|a| a.user_id.as_deref() == Some("user-2"))
        .unwrap();
    assert_eq!(amended.mappings_for_authorization(new_auth.id).len(), 1);
}

#[tokio::test]
async fn reauthorize_existing_auth_resource_swaps_accounts() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let authorization_id = consent.authorizations[0].id;

    let reauthorized = service
        .reauthorize_existing_auth_resource(
            consent.consent_id(),
            authorization_id,
            "user-1",
            &account_permissions(&[("acc-3", &["read"])]),
            AUTHORISED,
            AUTHORISED,
        )
        .await
        .unwrap();

    let active: Vec<&str> = reauthorized
        .active_mappings()
        .iter()
        .map(|m| m.account_id.as_str())
        .collect();
    assert_eq!(active, vec!["acc-3"]);
}

#[tokio::test]
async fn reauthorization_with_a_stale_expected_status_is_a_conflict() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let result = service
        .reauthorize_existing_auth_resource(
            consent.consent_id(),
            consent.authorizations[0].id,
            "user-1",
            &account_permissions(&[("acc-3", &["read"])]),
            AWAITING_AUTHORISATION, // 実際は Authorised
            AUTHORISED,
        )
        .await;
    assert!(matches!(result, Err(ConsentError::Conflict(_))));
}

#[tokio::test]
async fn reauthorize_with_new_auth_resource_retires_the_old_one() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let consent = authorized_consent(&service, "user-1").await;
    let old_authorization_id = consent.authorizations[0].id;

    let reauthorized = service
        .reauthorize_consent_with_new_auth_resource(
            consent.consent_id(),
            "user-1",
            &account_permissions(&[("acc-5", &["read"])]),
            AUTHORISED,
            AUTHORISED,
            "Retired",
            "Authorised",
            "authorization",
        )
        .await
        .unwrap();

    assert_eq!(reauthorized.authorizations.len(), 2);
    let old_auth = reauthorized
        .authorizations
        .iter()
        .find(|a| a.id == old_authorization_id)
        .unwrap();
    assert_eq!(old_auth.authorization_status, "Retired");

    // 旧認可のマッピングはすべて inactive、新認可のみ active
    let active = reauthorized.active_mappings();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].account_id, "acc-5");
    assert_ne!(active[0].authorization_id, old_authorization_id);
}

#[tokio::test]
async fn exclusive_consent_supersedes_existing_ones() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let existing = authorized_consent(&service, "user-1").await;

    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_exclusive_consent(
            &payload,
            "user-1",
            "Created",
            "authorization",
            AUTHORISED,
            REVOKED,
            true,
        )
        .await
        .unwrap();

    let superseded = service.get_detailed_consent(existing.consent_id()).await.unwrap();
    assert_eq!(superseded.consent.current_status, REVOKED);
    assert!(superseded.active_mappings().is_empty());

    let fresh = service.get_detailed_consent(created.consent_id()).await.unwrap();
    assert_eq!(fresh.consent.current_status, AWAITING_AUTHORISATION);
    assert_eq!(fresh.authorizations.len(), 1);
}

// tests/consent_search_tests.rs
mod common;

use common::db::TestDatabase;
use common::test_data::*;
use consent_core::dto::consent_dto::{AuditSearchFilter, ConsentSearchFilter};
use consent_core::ConsentError;
use std::collections::HashMap;

#[tokio::test]
async fn search_is_scoped_to_the_org() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    service
        .create_authorizable_consent(
            &create_consent_payload("org-1", "client-1"),
            None,
            None,
            None,
            false,
        )
        .await
        .unwrap();
    service
        .create_authorizable_consent(
            &create_consent_payload("org-2", "client-1"),
            None,
            None,
            None,
            false,
        )
        .await
        .unwrap();

    let found = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].consent.org_id, "org-1");
}

#[tokio::test]
async fn search_requires_an_org() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let result = service
        .search_detailed_consents(&ConsentSearchFilter::default())
        .await;
    assert!(matches!(result, Err(ConsentError::Validation(_))));
}

#[tokio::test]
async fn search_filters_by_user_through_authorizations() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let mine = service
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
        .create_authorizable_consent(
            &payload,
            Some("user-2"),
            Some("Created"),
            Some("authorization"),
            true,
        )
        .await
        .unwrap();

    let found = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            user_ids: Some(vec!["user-1".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].consent_id(), mine.consent_id());
    // ハイドレーション済みで返る
    assert_eq!(found[0].authorizations.len(), 1);

    let nobody = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            user_ids: Some(vec!["stranger".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn search_filters_combine_with_and_semantics() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let accounts = create_consent_payload("org-1", "client-1");
    let mut payments = create_consent_payload("org-1", "client-2");
    payments.consent_type = "payments".to_string();

    service
        .create_authorizable_consent(&accounts, None, None, None, false)
        .await
        .unwrap();
    let payment_consent = service
        .create_authorizable_consent(&payments, None, None, None, false)
        .await
        .unwrap();

    let found = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            client_ids: Some(vec!["client-2".to_string()]),
            consent_types: Some(vec!["payments".to_string()]),
            statuses: Some(vec![AWAITING_AUTHORISATION.to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].consent_id(), payment_consent.consent_id());
}

#[tokio::test]
async fn search_pages_are_ordered_by_recency_and_clamped() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    for _ in 0..5 {
        service
            .create_authorizable_consent(&payload, None, None, None, false)
            .await
            .unwrap();
    }

    let first_page = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first_page.len(), 2);
    assert!(first_page[0].consent.updated_at >= first_page[1].consent.updated_at);

    let second_page = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            limit: Some(2),
            offset: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second_page.len(), 2);
    assert_ne!(first_page[0].consent_id(), second_page[0].consent_id());

    // 過大なページサイズは設定の上限に収められる（既定の最大は100）
    let clamped = service
        .search_detailed_consents(&ConsentSearchFilter {
            org_id: "org-1".to_string(),
            limit: Some(10_000),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(clamped.len(), 5);
}

#[tokio::test]
async fn attribute_store_supports_reverse_lookup() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let consent = service
        .create_authorizable_consent(&payload, None, None, None, false)
        .await
        .unwrap();

    service
        .attribute_service()
        .store_attributes(
            consent.consent_id(),
            &HashMap::from([
                ("sessionKey".to_string(), "s-42".to_string()),
                ("channel".to_string(), "mobile".to_string()),
            ]),
        )
        .await
        .unwrap();

    let ids = service
        .attribute_service()
        .get_consent_ids_by_attribute("sessionKey", "s-42")
        .await
        .unwrap();
    assert_eq!(ids, vec![consent.consent_id()]);

    let by_name = service
        .attribute_service()
        .get_attributes_by_name("channel")
        .await
        .unwrap();
    assert_eq!(
        by_name.get(&consent.consent_id()).map(String::as_str),
        Some("mobile")
    );

    // 上書きは冪等
    service
        .attribute_service()
        .store_attributes(
            consent.consent_id(),
            &HashMap::from([("channel".to_string(), "web".to_string())]),
        )
        .await
        .unwrap();
    let attributes = service
        .attribute_service()
        .get_attributes(consent.consent_id(), None)
        .await
        .unwrap();
    assert_eq!(attributes.get("channel").map(String::as_str), Some("web"));
    assert_eq!(attributes.len(), 2);

    let deleted = service
        .attribute_service()
        .delete_attributes(consent.consent_id(), &["channel".to_string()])
        .await
        .unwrap();
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn audit_search_filters_by_actor_and_status() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let consent = service
        .create_authorizable_consent(&payload, None, None, None, false)
        .await
        .unwrap();
    service
        .update_consent_status(consent.consent_id(), AUTHORISED, Some("psu@bank"), None)
        .await
        .unwrap();
    service
        .update_consent_status(consent.consent_id(), REVOKED, Some("admin@bank"), None)
        .await
        .unwrap();

    let by_actor = service
        .audit_service()
        .search_audit_records(&AuditSearchFilter {
            consent_id: Some(consent.consent_id()),
            action_by: Some("psu@bank".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_actor.len(), 1);
    assert_eq!(by_actor[0].current_status, AUTHORISED);

    let by_status = service
        .audit_service()
        .search_audit_records(&AuditSearchFilter {
            consent_id: Some(consent.consent_id()),
            status: Some(REVOKED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_status.len(), 1);

    let paged = service
        .audit_service()
        .get_audit_records(Some(vec![consent.consent_id()]), 2, 0)
        .await
        .unwrap();
    assert_eq!(paged.len(), 2);
}

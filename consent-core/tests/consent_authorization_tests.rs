// tests/consent_authorization_tests.rs
mod common;

use common::db::TestDatabase;
use common::test_data::*;
use consent_core::domain::mapping_status::MappingStatus;
use consent_core::ConsentError;
use uuid::Uuid;

#[tokio::test]
async fn bind_user_accounts_creates_mappings_and_advances_the_consent() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_authorizable_consent(
            &payload,
            None,
            Some("Created"),
            Some("authorization"),
            true,
        )
        .await
        .unwrap();
    let authorization_id = created.authorizations[0].id;

    service
        .authorization_service()
        .bind_user_accounts_to_consent(
            created.consent_id(),
            authorization_id,
            "user-1",
            &account_permissions(&[("acc-1", &["read", "write"]), ("acc-2", &["read"])]),
            "Authorised",
            AUTHORISED,
        )
        .await
        .unwrap();

    let detailed = service.get_detailed_consent(created.consent_id()).await.unwrap();
    assert_eq!(detailed.consent.current_status, AUTHORISED);
    assert_eq!(detailed.authorizations[0].user_id.as_deref(), Some("user-1"));
    assert_eq!(detailed.authorizations[0].authorization_status, "Authorised");
    assert_eq!(detailed.active_mappings().len(), 3);
}

#[tokio::test]
async fn binding_with_an_authorization_of_another_consent_is_rejected() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let first = service
        .create_authorizable_consent(&payload, None, Some("Created"), Some("authorization"), true)
        .await
        .unwrap();
    let second = service
        .create_authorizable_consent(&payload, None, Some("Created"), Some("authorization"), true)
        .await
        .unwrap();

    let result = service
        .authorization_service()
        .bind_user_accounts_to_consent(
            first.consent_id(),
            second.authorizations[0].id,
            "user-1",
            &account_permissions(&[("acc-1", &["read"])]),
            "Authorised",
            AUTHORISED,
        )
        .await;

    assert!(matches!(result, Err(ConsentError::Validation(_))));
}

#[tokio::test]
async fn create_and_get_authorization_resource() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_authorizable_consent(&payload, None, None, None, false)
        .await
        .unwrap();

    let authorization = service
        .authorization_service()
        .create_authorization(created.consent_id(), &new_authorization(Some("user-1")))
        .await
        .unwrap();

    let fetched = service
        .authorization_service()
        .get_authorization(authorization.id)
        .await
        .unwrap();
    assert_eq!(fetched.consent_id, created.consent_id());
    assert_eq!(fetched.user_id.as_deref(), Some("user-1"));

    let missing = service
        .authorization_service()
        .get_authorization(Uuid::new_v4())
        .await;
    assert!(matches!(missing, Err(ConsentError::NotFound(_))));
}

#[tokio::test]
async fn authorization_for_missing_consent_is_not_found() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let result = service
        .authorization_service()
        .create_authorization(Uuid::new_v4(), &new_authorization(None))
        .await;
    assert!(matches!(result, Err(ConsentError::NotFound(_))));
}

#[tokio::test]
async fn search_authorizations_by_user() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

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
        .authorization_service()
        .search_authorizations(None, Some("user-1"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].consent_id, created.consent_id());
}

#[tokio::test]
async fn update_authorization_status_and_user() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_authorizable_consent(&payload, None, Some("Created"), Some("authorization"), true)
        .await
        .unwrap();
    let authorization_id = created.authorizations[0].id;

    service
        .authorization_service()
        .update_authorization_user(authorization_id, "user-1")
        .await
        .unwrap();
    service
        .authorization_service()
        .update_authorization_status(authorization_id, "Authorised")
        .await
        .unwrap();

    let fetched = service
        .authorization_service()
        .get_authorization(authorization_id)
        .await
        .unwrap();
    assert_eq!(fetched.user_id.as_deref(), Some("user-1"));
    assert_eq!(fetched.authorization_status, "Authorised");

    let missing = service
        .authorization_service()
        .update_authorization_status(Uuid::new_v4(), "Authorised")
        .await;
    assert!(matches!(missing, Err(ConsentError::NotFound(_))));
}

#[tokio::test]
async fn deactivating_mappings_is_idempotent() {
    common::init_test_env();
    let db = TestDatabase::new().await;
    let service = build_service(&db.connection);

    let payload = create_consent_payload("org-1", "client-1");
    let created = service
        .create_authorizable_consent(&payload, None, Some("Created"), Some("authorization"), true)
        .await
        .unwrap();
    let authorization_id = created.authorizations[0].id;

    let mappings = service
        .authorization_service()
        .create_account_mappings(
            authorization_id,
            &account_permissions(&[("acc-1", &["read"])]),
        )
        .await
        .unwrap();
    let mapping_ids: Vec<Uuid> = mappings.iter().map(|m| m.id).collect();

    let first = service
        .authorization_service()
        .deactivate_account_mappings(mapping_ids.clone())
        .await
        .unwrap();
    assert_eq!(first, 1);

    // 既に inactive でも成功する
    let second = service
        .authorization_service()
        .deactivate_account_mappings(mapping_ids.clone())
        .await
        .unwrap();
    assert_eq!(second, 1);

    // 空集合も成功する
    let none = service
        .authorization_service()
        .deactivate_account_mappings(Vec::new())
        .await
        .unwrap();
    assert_eq!(none, 0);

    let reactivated = service
        .authorization_service()
        .update_account_mapping_status(mapping_ids, MappingStatus::Active)
        .await
        .unwrap();
    assert_eq!(reactivated, 1);
}

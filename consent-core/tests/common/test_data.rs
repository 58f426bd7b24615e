// tests/common/test_data.rs
use consent_core::config::ConsentConfig;
use consent_core::dto::consent_dto::{AccountPermissionsMap, CreateConsentDto, NewAuthorizationDto};
use consent_core::service::consent_service::ConsentService;
use consent_core::service::token_revocation::{NoopTokenRevoker, TokenRevoker};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

pub const AWAITING_AUTHORISATION: &str = "AwaitingAuthorisation";
pub const AUTHORISED: &str = "Authorised";
pub const REVOKED: &str = "Revoked";

pub fn build_service(connection: &DatabaseConnection) -> ConsentService {
    build_service_with_revoker(connection, Arc::new(NoopTokenRevoker))
}

pub fn build_service_with_revoker(
    connection: &DatabaseConnection,
    token_revoker: Arc<dyn TokenRevoker>,
) -> ConsentService {
    // 接続は外から渡すため、設定のURLはプレースホルダで良い
    let config = ConsentConfig::with_database_url("postgres://unused");
    ConsentService::new(connection.clone(), config, token_revoker)
}

pub fn create_consent_payload(org_id: &str, client_id: &str) -> CreateConsentDto {
    CreateConsentDto {
        org_id: org_id.to_string(),
        client_id: client_id.to_string(),
        receipt: json!({"permissions": ["accounts"]}),
        consent_type: "accounts".to_string(),
        frequency: 1,
        validity_period: 0,
        recurring_indicator: false,
        current_status: AWAITING_AUTHORISATION.to_string(),
        attributes: None,
    }
}

pub fn new_authorization(user_id: Option<&str>) -> NewAuthorizationDto {
    NewAuthorizationDto {
        authorization_status: "Created".to_string(),
        authorization_type: "authorization".to_string(),
        user_id: user_id.map(|u| u.to_string()),
    }
}

pub fn account_permissions(pairs: &[(&str, &[&str])]) -> AccountPermissionsMap {
    pairs
        .iter()
        .map(|(account_id, permissions)| {
            (
                account_id.to_string(),
                permissions.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect()
}

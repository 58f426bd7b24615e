// src/service/mod.rs
pub mod consent_attribute_service;
pub mod consent_audit_service;
pub mod consent_authorization_service;
pub mod consent_history_service;
pub mod consent_service;
pub mod token_revocation;

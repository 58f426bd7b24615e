// src/repository/mod.rs
pub mod consent_attribute_repository;
pub mod consent_authorization_repository;
pub mod consent_history_repository;
pub mod consent_mapping_repository;
pub mod consent_repository;
pub mod consent_status_audit_repository;

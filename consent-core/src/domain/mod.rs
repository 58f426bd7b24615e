// src/domain/mod.rs
pub mod consent_attribute_model;
pub mod consent_authorization_model;
pub mod consent_history_model;
pub mod consent_mapping_model;
pub mod consent_model;
pub mod consent_status_audit_model;
pub mod detailed_consent;
pub mod mapping_status;

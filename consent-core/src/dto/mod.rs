// src/dto/mod.rs
pub mod consent_dto;

pub use consent_dto::*;

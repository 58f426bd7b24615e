// src/lib.rs
pub mod config;
pub mod db;
pub mod domain;
pub mod dto;
pub mod error;
pub mod logging;
pub mod repository;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use error::{ConsentError, ConsentResult};
pub use service::consent_service::ConsentService;

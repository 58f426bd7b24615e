// src/error.rs

use sea_orm::DbErr;
use thiserror::Error;
use validator::ValidationErrors;

/// 同意エンジンのエラー分類。トランスポート層へのマッピングは
/// 呼び出し側（エンドポイント層）の責務
#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("Database error: {0}")]
    Persistence(#[from] DbErr),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed")]
    ValidationFailure(#[from] ValidationErrors),

    #[error("Failed to parse UUID: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ConsentError {
    /// 分類名（ログ・バルク結果の集計用）
    pub fn kind(&self) -> &'static str {
        match self {
            ConsentError::Persistence(_) => "persistence",
            ConsentError::NotFound(_) => "not_found",
            ConsentError::Validation(_) | ConsentError::ValidationFailure(_) => "validation",
            ConsentError::UuidError(_) => "validation",
            ConsentError::Conflict(_) => "conflict",
            ConsentError::Unknown(_) => "unknown",
        }
    }
}

// Result 型のエイリアス
pub type ConsentResult<T> = Result<T, ConsentError>;

// consent-core/src/utils/error_helper.rs

//! エラーハンドリングの統一化ヘルパー
//!
//! 全てのサービス層で共通して使用するエラー処理パターンを提供します。

use crate::error::ConsentError;
use tracing::{error, warn};
use validator::ValidationErrors;

/// validatorのValidationErrorsをConsentErrorに変換する統一処理
pub fn convert_validation_errors(validation_errors: ValidationErrors, context: &str) -> ConsentError {
    warn!(
        context = %context,
        error_count = validation_errors.field_errors().len(),
        "Validation failed"
    );

    let messages: Vec<String> = validation_errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| "Invalid value".to_string(), |cow| cow.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();

    ConsentError::Validation(messages.join(", "))
}

/// 単一のバリデーションエラーメッセージを生成
pub fn validation_error(message: &str, context: &str) -> ConsentError {
    warn!(context = %context, message = %message, "Validation failed");
    ConsentError::Validation(message.to_string())
}

/// NotFoundエラーをログ付きで生成
pub fn not_found_error(message: &str, context: &str) -> ConsentError {
    warn!(context = %context, message = %message, "Resource not found");
    ConsentError::NotFound(message.to_string())
}

/// Conflictエラーをログ付きで生成
pub fn conflict_error(message: &str, context: &str) -> ConsentError {
    warn!(context = %context, message = %message, "State conflict");
    ConsentError::Conflict(message.to_string())
}

/// 分類不能なエラーをログ付きで生成（原因をマスクしない）
pub fn unknown_error(cause: &str, context: &str) -> ConsentError {
    error!(context = %context, cause = %cause, "Unclassified failure");
    ConsentError::Unknown(cause.to_string())
}

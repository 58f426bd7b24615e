// src/dto/consent_dto.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// account_id → 権限リスト。アカウントごとに複数権限をバインドできる
pub type AccountPermissionsMap = HashMap<String, Vec<String>>;

// --- Request DTOs ---

#[derive(Deserialize, Serialize, Debug, Clone, Validate)]
pub struct CreateConsentDto {
    #[validate(length(min = 1, message = "Org ID is required"))]
    pub org_id: String,

    #[validate(length(min = 1, message = "Client ID is required"))]
    pub client_id: String,

    /// 同意内容のレシート（不透明なJSONペイロード、必須）
    pub receipt: serde_json::Value,

    #[validate(length(min = 1, message = "Consent type is required"))]
    pub consent_type: String,

    /// 1日あたりの最大利用回数
    pub frequency: i32,

    /// 有効期限（エポック秒、0 は無期限）
    pub validity_period: i64,

    pub recurring_indicator: bool,

    #[validate(length(min = 1, message = "Initial consent status is required"))]
    pub current_status: String,

    /// 作成時に併せて保存する属性（任意）
    pub attributes: Option<HashMap<String, String>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Validate)]
pub struct NewAuthorizationDto {
    #[validate(length(min = 1, message = "Authorization status is required"))]
    pub authorization_status: String,

    #[validate(length(min = 1, message = "Authorization type is required"))]
    pub authorization_type: String,

    /// ユーザー紐付け前は None
    pub user_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewMappingDto {
    pub account_id: String,
    pub permission: String,
    /// バインド対象リソースの任意ペイロード
    pub resource: Option<serde_json::Value>,
}

/// 修正リクエスト。レシートか有効期限の少なくとも一方が必要
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AmendConsentDto {
    pub receipt: Option<serde_json::Value>,
    pub validity_period: Option<i64>,
    /// マッピング集合を付け替える対象の認可リソース
    pub authorization_id: Uuid,
    pub account_permissions: AccountPermissionsMap,
    /// 修正後の属性全集合（その場で上書き）
    pub attributes: HashMap<String, String>,
    pub user_id: String,
}

// --- Search filters ---

/// 詳細同意の複合検索フィルタ。リストは内部でOR、パラメータ間はAND
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ConsentSearchFilter {
    pub org_id: String,
    pub consent_ids: Option<Vec<Uuid>>,
    pub client_ids: Option<Vec<String>>,
    pub consent_types: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    /// 認可リソース経由のユーザーフィルタ
    pub user_ids: Option<Vec<String>>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// 監査レコードの検索フィルタ。指定されたフィルタのみをANDで適用
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct AuditSearchFilter {
    pub consent_id: Option<Uuid>,
    pub status: Option<String>,
    pub action_by: Option<String>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub audit_id: Option<Uuid>,
}

// --- Bulk operations ---

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BulkStatusUpdateFilter {
    pub org_id: String,
    pub client_id: String,
    pub new_status: String,
    pub reason: Option<String>,
    pub user_id: Option<String>,
    pub consent_type: String,
    /// この状態にある同意のみが遷移対象
    pub applicable_statuses: Vec<String>,
}

/// バルク操作の結果。同意単位でコミットされるため、
/// 失敗分だけを呼び出し側が再試行できる
#[derive(Debug, Default)]
pub struct BulkStatusUpdateResult {
    pub updated: Vec<Uuid>,
    pub failures: Vec<BulkStatusUpdateFailure>,
}

#[derive(Debug)]
pub struct BulkStatusUpdateFailure {
    pub consent_id: Uuid,
    pub error: crate::error::ConsentError,
}

impl BulkStatusUpdateResult {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

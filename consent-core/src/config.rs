// src/config.rs
use dotenvy::dotenv;
use std::env;

/// 同意エンジンの設定。すべての認識オプションを名前付きフィールドで持つ
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    pub database_url: String,
    /// 検索のデフォルトページサイズ
    pub default_page_size: u64,
    /// 検索の最大ページサイズ（過大なページサイズを防止）
    pub max_page_size: u64,
    /// この状態にある同意は失効操作を受け付けない
    pub terminal_statuses: Vec<String>,
    /// 修正履歴の差分を保存するかどうか
    pub amendment_history_enabled: bool,
}

impl ConsentConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv().ok(); // .env ファイルを読み込む (存在しなくてもエラーにしない)

        let database_url = env::var("DATABASE_URL")?;
        let default_page_size = env::var("CONSENT_DEFAULT_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let max_page_size = env::var("CONSENT_MAX_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let terminal_statuses = env::var("CONSENT_TERMINAL_STATUSES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| Self::default_terminal_statuses());
        let amendment_history_enabled = env::var("CONSENT_AMENDMENT_HISTORY_ENABLED")
            .map(|v| v != "false")
            .unwrap_or(true);

        Ok(ConsentConfig {
            database_url,
            default_page_size,
            max_page_size,
            terminal_statuses,
            amendment_history_enabled,
        })
    }

    /// DB接続なしで使うテスト・組み込み向けのデフォルト
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        ConsentConfig {
            database_url: database_url.into(),
            default_page_size: 10,
            max_page_size: 100,
            terminal_statuses: Self::default_terminal_statuses(),
            amendment_history_enabled: true,
        }
    }

    fn default_terminal_statuses() -> Vec<String> {
        vec![
            "Revoked".to_string(),
            "Expired".to_string(),
            "Rejected".to_string(),
            "Consumed".to_string(),
        ]
    }

    pub fn is_terminal_status(&self, status: &str) -> bool {
        self.terminal_statuses.iter().any(|s| s == status)
    }

    /// ページサイズを上限に収める
    pub fn clamp_page_size(&self, requested: Option<u64>) -> u64 {
        std::cmp::min(requested.unwrap_or(self.default_page_size), self.max_page_size)
    }
}

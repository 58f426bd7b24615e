// src/service/token_revocation.rs

use crate::domain::detailed_consent::DetailedConsent;
use crate::error::ConsentResult;
use async_trait::async_trait;

/// 外部のトークン失効コラボレータ。
/// コミット後にベストエフォートで呼ばれる（失敗しても同意の状態遷移は
/// 取り消されない）
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    async fn revoke_tokens_for_consent(
        &self,
        consent: &DetailedConsent,
        user_id: &str,
    ) -> ConsentResult<()>;
}

/// トークン基盤を持たないデプロイ・テスト用の実装
pub struct NoopTokenRevoker;

#[async_trait]
impl TokenRevoker for NoopTokenRevoker {
    async fn revoke_tokens_for_consent(
        &self,
        consent: &DetailedConsent,
        _user_id: &str,
    ) -> ConsentResult<()> {
        tracing::debug!(
            consent_id = %consent.consent_id(),
            "Token revocation skipped (no-op revoker)"
        );
        Ok(())
    }
}

// src/domain/detailed_consent.rs
use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::consent_authorization_model::Model as AuthorizationModel;
use super::consent_mapping_model::Model as MappingModel;
use super::consent_model::Model as ConsentModel;
use super::mapping_status::MappingStatus;

/// 完全にハイドレートされた読み取り専用の集約。
/// 読み取り時に構築され、それ自体は永続化されない（構成要素が永続化される）。
/// 部分構築された集約が共有状態に漏れないよう、一括コンストラクタのみを持つ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedConsent {
    pub consent: ConsentModel,
    pub authorizations: Vec<AuthorizationModel>,
    pub mappings: Vec<MappingModel>,
    pub attributes: HashMap<String, String>,
}

impl DetailedConsent {
    pub fn new(
        consent: ConsentModel,
        authorizations: Vec<AuthorizationModel>,
        mappings: Vec<MappingModel>,
        attributes: HashMap<String, String>,
    ) -> Self {
        Self {
            consent,
            authorizations,
            mappings,
            attributes,
        }
    }

    pub fn consent_id(&self) -> Uuid {
        self.consent.id
    }

    /// 同意から到達可能な全マッピングのID
    pub fn mapping_ids(&self) -> Vec<Uuid> {
        self.mappings.iter().map(|m| m.id).collect()
    }

    /// active 状態のマッピングのみ
    pub fn active_mappings(&self) -> Vec<&MappingModel> {
        self.mappings
            .iter()
            .filter(|m| m.mapping_status == MappingStatus::Active.as_str())
            .collect()
    }

    /// 最初の認可リソースに紐付くユーザー（トークン失効で使用）
    pub fn primary_user_id(&self) -> Option<&str> {
        self.authorizations
            .iter()
            .find_map(|auth| auth.user_id.as_deref())
    }

    /// 指定した認可リソース配下のマッピング
    pub fn mappings_for_authorization(&self, authorization_id: Uuid) -> Vec<&MappingModel> {
        self.mappings
            .iter()
            .filter(|m| m.authorization_id == authorization_id)
            .collect()
    }
}

// src/service/consent_history_service.rs
use crate::db::DbPool;
use crate::domain::consent_history_model::{
    self, section, ActiveModel as HistoryActiveModel, ConsentHistoryEntry,
};
use crate::domain::detailed_consent::DetailedConsent;
use crate::error::ConsentResult;
use crate::repository::consent_history_repository::ConsentHistoryRepository;
use crate::utils::error_helper::unknown_error;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, Set};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// 修正履歴エンジン。修正1回につき「修正前の値」の差分行を
/// セクション単位で保存し、後から任意時点の詳細同意を再構築する
pub struct ConsentHistoryService {
    db: DbPool,
}

impl ConsentHistoryService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// 修正の差分行を呼び出し元のトランザクション内で保存する。
    /// history_id には対応する監査レコードのIDを渡す
    pub async fn store_amendment_history<C: ConnectionTrait>(
        &self,
        conn: &C,
        history_id: Uuid,
        reason: &str,
        previous: &DetailedConsent,
        current: &DetailedConsent,
    ) -> ConsentResult<usize> {
        let rows = build_amendment_rows(history_id, Utc::now(), reason, previous, current)?;
        let row_count = rows.len();

        let active_rows = rows.into_iter().map(to_active_row).collect();
        ConsentHistoryRepository::insert_many(conn, active_rows).await?;

        tracing::debug!(
            consent_id = %current.consent_id(),
            history_id = %history_id,
            row_count,
            "Stored amendment history diff rows"
        );

        Ok(row_count)
    }

    /// 修正履歴を新しい順に再構築する。各エントリの詳細同意は
    /// 「その修正が適用される直前」の状態
    pub async fn get_amendment_history(
        &self,
        current: &DetailedConsent,
        history_ids: Option<Vec<Uuid>>,
    ) -> ConsentResult<Vec<ConsentHistoryEntry>> {
        let rows =
            ConsentHistoryRepository::find_for_consent(&self.db, current.consent_id(), history_ids)
                .await?;
        reconstruct_history(current, &rows)
    }
}

fn to_active_row(row: consent_history_model::Model) -> HistoryActiveModel {
    HistoryActiveModel {
        id: Set(row.id),
        history_id: Set(row.history_id),
        consent_id: Set(row.consent_id),
        record_id: Set(row.record_id),
        section_type: Set(row.section_type),
        changed_attributes: Set(row.changed_attributes),
        reason: Set(row.reason),
        amended_at: Set(row.amended_at),
    }
}

fn history_row(
    history_id: Uuid,
    consent_id: Uuid,
    record_id: Uuid,
    section_type: &str,
    changed_attributes: Option<Value>,
    reason: &str,
    amended_at: DateTime<Utc>,
) -> consent_history_model::Model {
    consent_history_model::Model {
        id: Uuid::new_v4(),
        history_id,
        consent_id,
        record_id,
        section_type: section_type.to_string(),
        changed_attributes,
        reason: reason.to_string(),
        amended_at,
    }
}

fn to_json<T: serde::Serialize>(value: &T, context: &str) -> ConsentResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| unknown_error(&format!("Failed to serialize history value: {}", e), context))
}

/// 修正前後の詳細同意を比較し、変更されたセクションごとに
/// 「修正前の値」を持つ差分行を組み立てる。
/// changed_attributes が NULL の行は「修正前には存在しなかった」の印
pub(crate) fn build_amendment_rows(
    history_id: Uuid,
    amended_at: DateTime<Utc>,
    reason: &str,
    previous: &DetailedConsent,
    current: &DetailedConsent,
) -> ConsentResult<Vec<consent_history_model::Model>> {
    let context = "consent_history_service::build_amendment_rows";
    let consent_id = current.consent_id();
    let mut rows = Vec::new();

    // 同意本体の差分
    let mut consent_changes = Map::new();
    if previous.consent.receipt != current.consent.receipt {
        consent_changes.insert("receipt".to_string(), previous.consent.receipt.clone());
    }
    if previous.consent.validity_period != current.consent.validity_period {
        consent_changes.insert(
            "validity_period".to_string(),
            Value::from(previous.consent.validity_period),
        );
    }
    if previous.consent.current_status != current.consent.current_status {
        consent_changes.insert(
            "current_status".to_string(),
            Value::from(previous.consent.current_status.clone()),
        );
    }
    if !consent_changes.is_empty() {
        consent_changes.insert(
            "updated_at".to_string(),
            to_json(&previous.consent.updated_at, context)?,
        );
        rows.push(history_row(
            history_id,
            consent_id,
            consent_id,
            section::CONSENT_DATA,
            Some(Value::Object(consent_changes)),
            reason,
            amended_at,
        ));
    }

    // 属性の差分。追加キーは null、変更・削除キーは修正前の値
    let mut attribute_changes = Map::new();
    for (key, value) in &current.attributes {
        match previous.attributes.get(key) {
            Some(previous_value) if previous_value != value => {
                attribute_changes.insert(key.clone(), Value::from(previous_value.clone()));
            }
            None => {
                attribute_changes.insert(key.clone(), Value::Null);
            }
            _ => {}
        }
    }
    for (key, previous_value) in &previous.attributes {
        if !current.attributes.contains_key(key) {
            attribute_changes.insert(key.clone(), Value::from(previous_value.clone()));
        }
    }
    if !attribute_changes.is_empty() {
        rows.push(history_row(
            history_id,
            consent_id,
            consent_id,
            section::CONSENT_ATTRIBUTES_DATA,
            Some(Value::Object(attribute_changes)),
            reason,
            amended_at,
        ));
    }

    // マッピングの差分。account_id と permission は不変なので状態のみ追う
    for mapping in &current.mappings {
        match previous.mappings.iter().find(|m| m.id == mapping.id) {
            None => {
                rows.push(history_row(
                    history_id,
                    consent_id,
                    mapping.id,
                    section::CONSENT_MAPPING_DATA,
                    None,
                    reason,
                    amended_at,
                ));
            }
            Some(previous_mapping) if previous_mapping.mapping_status != mapping.mapping_status => {
                let mut changes = Map::new();
                changes.insert(
                    "mapping_status".to_string(),
                    Value::from(previous_mapping.mapping_status.clone()),
                );
                rows.push(history_row(
                    history_id,
                    consent_id,
                    mapping.id,
                    section::CONSENT_MAPPING_DATA,
                    Some(Value::Object(changes)),
                    reason,
                    amended_at,
                ));
            }
            _ => {}
        }
    }

    // 認可リソースの差分
    for authorization in &current.authorizations {
        match previous
            .authorizations
            .iter()
            .find(|a| a.id == authorization.id)
        {
            None => {
                rows.push(history_row(
                    history_id,
                    consent_id,
                    authorization.id,
                    section::CONSENT_AUTH_RESOURCE_DATA,
                    None,
                    reason,
                    amended_at,
                ));
            }
            Some(previous_auth) => {
                let mut changes = Map::new();
                if previous_auth.user_id != authorization.user_id {
                    changes.insert(
                        "user_id".to_string(),
                        to_json(&previous_auth.user_id, context)?,
                    );
                }
                if previous_auth.authorization_status != authorization.authorization_status {
                    changes.insert(
                        "authorization_status".to_string(),
                        Value::from(previous_auth.authorization_status.clone()),
                    );
                }
                if !changes.is_empty() {
                    changes.insert(
                        "updated_at".to_string(),
                        to_json(&previous_auth.updated_at, context)?,
                    );
                    rows.push(history_row(
                        history_id,
                        consent_id,
                        authorization.id,
                        section::CONSENT_AUTH_RESOURCE_DATA,
                        Some(Value::Object(changes)),
                        reason,
                        amended_at,
                    ));
                }
            }
        }
    }

    Ok(rows)
}

/// 差分行を新しい修正から順に現在の詳細同意へ巻き戻し、
/// 各修正の直前のスナップショットを得る
pub(crate) fn reconstruct_history(
    current: &DetailedConsent,
    rows: &[consent_history_model::Model],
) -> ConsentResult<Vec<ConsentHistoryEntry>> {
    // 行の並びが乱れていても修正単位が割れないよう、初出順を保って
    // history_id ごとにまとめ直す
    let mut group_order: Vec<Uuid> = Vec::new();
    let mut grouped: HashMap<Uuid, Vec<&consent_history_model::Model>> = HashMap::new();
    for row in rows {
        if !grouped.contains_key(&row.history_id) {
            group_order.push(row.history_id);
        }
        grouped.entry(row.history_id).or_default().push(row);
    }

    let mut entries = Vec::new();
    let mut working = current.clone();

    for history_id in group_order {
        let group = &grouped[&history_id];
        for row in group {
            apply_diff_row(&mut working, row)?;
        }
        entries.push(ConsentHistoryEntry {
            history_id,
            amended_at: group[0].amended_at,
            reason: group[0].reason.clone(),
            detailed_consent: working.clone(),
        });
    }

    Ok(entries)
}

fn apply_diff_row(
    working: &mut DetailedConsent,
    row: &consent_history_model::Model,
) -> ConsentResult<()> {
    let context = "consent_history_service::apply_diff_row";

    match row.section_type.as_str() {
        section::CONSENT_DATA => {
            let changes = require_object(row, context)?;
            if let Some(receipt) = changes.get("receipt") {
                working.consent.receipt = receipt.clone();
            }
            if let Some(validity_period) = changes.get("validity_period") {
                working.consent.validity_period = validity_period.as_i64().ok_or_else(|| {
                    unknown_error("Corrupt history row: validity_period is not an integer", context)
                })?;
            }
            if let Some(current_status) = changes.get("current_status") {
                working.consent.current_status = require_string(current_status, context)?;
            }
            if let Some(updated_at) = changes.get("updated_at") {
                working.consent.updated_at = parse_timestamp(updated_at, context)?;
            }
        }
        section::CONSENT_ATTRIBUTES_DATA => {
            let changes = require_object(row, context)?;
            for (key, value) in changes {
                if value.is_null() {
                    working.attributes.remove(key);
                } else {
                    working
                        .attributes
                        .insert(key.clone(), require_string(value, context)?);
                }
            }
        }
        section::CONSENT_MAPPING_DATA => match &row.changed_attributes {
            // NULL: この修正で追加されたマッピング
            None => working.mappings.retain(|m| m.id != row.record_id),
            Some(_) => {
                let changes = require_object(row, context)?;
                if let Some(mapping) = working.mappings.iter_mut().find(|m| m.id == row.record_id) {
                    if let Some(status) = changes.get("mapping_status") {
                        mapping.mapping_status = require_string(status, context)?;
                    }
                }
            }
        },
        section::CONSENT_AUTH_RESOURCE_DATA => match &row.changed_attributes {
            // NULL: この修正で追加された認可リソース（配下マッピングごと巻き戻す)
            None => {
                working.authorizations.retain(|a| a.id != row.record_id);
                working.mappings.retain(|m| m.authorization_id != row.record_id);
            }
            Some(_) => {
                let changes = require_object(row, context)?;
                if let Some(authorization) = working
                    .authorizations
                    .iter_mut()
                    .find(|a| a.id == row.record_id)
                {
                    if let Some(user_id) = changes.get("user_id") {
                        authorization.user_id = if user_id.is_null() {
                            None
                        } else {
                            Some(require_string(user_id, context)?)
                        };
                    }
                    if let Some(status) = changes.get("authorization_status") {
                        authorization.authorization_status = require_string(status, context)?;
                    }
                    if let Some(updated_at) = changes.get("updated_at") {
                        authorization.updated_at = parse_timestamp(updated_at, context)?;
                    }
                }
            }
        },
        other => {
            return Err(unknown_error(
                &format!("Unrecognized history section type: {}", other),
                context,
            ));
        }
    }

    Ok(())
}

fn require_object<'a>(
    row: &'a consent_history_model::Model,
    context: &str,
) -> ConsentResult<&'a Map<String, Value>> {
    row.changed_attributes
        .as_ref()
        .and_then(|v| v.as_object())
        .ok_or_else(|| unknown_error("Corrupt history row: payload is not an object", context))
}

fn require_string(value: &Value, context: &str) -> ConsentResult<String> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| unknown_error("Corrupt history row: expected a string value", context))
}

fn parse_timestamp(value: &Value, context: &str) -> ConsentResult<DateTime<Utc>> {
    serde_json::from_value(value.clone())
        .map_err(|e| unknown_error(&format!("Corrupt history row: bad timestamp: {}", e), context))
}

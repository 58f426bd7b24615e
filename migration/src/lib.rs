// migration/src/lib.rs
pub use sea_orm_migration::prelude::*;

// 同意エンジンの基本テーブル
mod m20260810_000001_create_consents_table;
mod m20260810_000002_create_consent_authorizations_table;
mod m20260810_000003_create_consent_mappings_table;
mod m20260810_000004_create_consent_attributes_table;
mod m20260810_000005_create_consent_status_audit_table;
mod m20260810_000006_create_consent_amendment_history_table;

// 検索用インデックス
mod m20260811_000001_add_consent_search_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            // 1. 依存関係の順にテーブルを作成
            Box::new(m20260810_000001_create_consents_table::Migration),
            Box::new(m20260810_000002_create_consent_authorizations_table::Migration),
            Box::new(m20260810_000003_create_consent_mappings_table::Migration),
            Box::new(m20260810_000004_create_consent_attributes_table::Migration),
            Box::new(m20260810_000005_create_consent_status_audit_table::Migration),
            Box::new(m20260810_000006_create_consent_amendment_history_table::Migration),
            // 2. インデックス追加
            Box::new(m20260811_000001_add_consent_search_indexes::Migration),
        ]
    }
}

use sea_orm_migration::prelude::*;

use crate::m20260810_000001_create_consents_table::Consents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 修正履歴テーブルの作成（セクション単位の差分を1行ずつ保持）
        manager
            .create_table(
                Table::create()
                    .table(ConsentAmendmentHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // 対応する監査レコードのID（修正1回分のキー）
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::HistoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::ConsentId)
                            .uuid()
                            .not_null(),
                    )
                    // 差分の対象エンティティ（consent / authorization / mapping のID）
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::RecordId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::SectionType)
                            .string()
                            .not_null(),
                    )
                    // NULL は「修正前には存在しなかったエンティティ」を表す
                    .col(ColumnDef::new(ConsentAmendmentHistory::ChangedAttributes).json_binary())
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::Reason)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAmendmentHistory::AmendedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_amendment_history_consent_id")
                            .from(
                                ConsentAmendmentHistory::Table,
                                ConsentAmendmentHistory::ConsentId,
                            )
                            .to(Consents::Table, Consents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consent_amendment_history_consent_id")
                    .table(ConsentAmendmentHistory::Table)
                    .col(ConsentAmendmentHistory::ConsentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consent_amendment_history_record_id")
                    .table(ConsentAmendmentHistory::Table)
                    .col(ConsentAmendmentHistory::RecordId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ConsentAmendmentHistory::Table)
                    .to_owned(),
            )
            .await
    }
}

/// Iden Enum for the 'consent_amendment_history' table and its columns
#[derive(DeriveIden)]
pub enum ConsentAmendmentHistory {
    Table,
    Id,
    HistoryId,
    ConsentId,
    RecordId,
    SectionType,
    ChangedAttributes,
    Reason,
    AmendedAt,
}

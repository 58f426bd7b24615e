use sea_orm_migration::prelude::*;

use crate::m20260810_000001_create_consents_table::Consents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ステータス監査テーブルの作成（追記専用）
        manager
            .create_table(
                Table::create()
                    .table(ConsentStatusAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentStatusAudit::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConsentStatusAudit::ConsentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentStatusAudit::CurrentStatus)
                            .string()
                            .not_null(),
                    )
                    // 初回作成時は NULL
                    .col(ColumnDef::new(ConsentStatusAudit::PreviousStatus).string())
                    .col(ColumnDef::new(ConsentStatusAudit::ActionBy).string())
                    .col(ColumnDef::new(ConsentStatusAudit::Reason).text())
                    .col(
                        ColumnDef::new(ConsentStatusAudit::ActionTime)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_status_audit_consent_id")
                            .from(ConsentStatusAudit::Table, ConsentStatusAudit::ConsentId)
                            .to(Consents::Table, Consents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consent_status_audit_consent_id")
                    .table(ConsentStatusAudit::Table)
                    .col(ConsentStatusAudit::ConsentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consent_status_audit_action_time")
                    .table(ConsentStatusAudit::Table)
                    .col(ConsentStatusAudit::ActionTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsentStatusAudit::Table).to_owned())
            .await
    }
}

/// Iden Enum for the 'consent_status_audit' table and its columns
#[derive(DeriveIden)]
pub enum ConsentStatusAudit {
    Table,
    Id,
    ConsentId,
    CurrentStatus,
    PreviousStatus,
    ActionBy,
    Reason,
    ActionTime,
}

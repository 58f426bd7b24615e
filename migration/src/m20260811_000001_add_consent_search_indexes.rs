use sea_orm_migration::prelude::*;

use crate::m20260810_000001_create_consents_table::Consents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 複合検索の主要パス: org + client + type + status
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .table(Consents::Table)
                    .name("idx_consents_org_client")
                    .col(Consents::OrgId)
                    .col(Consents::ClientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .table(Consents::Table)
                    .name("idx_consents_current_status")
                    .col(Consents::CurrentStatus)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .table(Consents::Table)
                    .name("idx_consents_consent_type")
                    .col(Consents::ConsentType)
                    .to_owned(),
            )
            .await?;

        // 時間範囲フィルタ用
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .table(Consents::Table)
                    .name("idx_consents_updated_at")
                    .col(Consents::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(Consents::Table)
                    .name("idx_consents_org_client")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .table(Consents::Table)
                    .name("idx_consents_current_status")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .table(Consents::Table)
                    .name("idx_consents_consent_type")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .table(Consents::Table)
                    .name("idx_consents_updated_at")
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

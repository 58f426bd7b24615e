use sea_orm_migration::prelude::*;

use crate::m20260810_000002_create_consent_authorizations_table::ConsentAuthorizations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // アカウント・権限マッピングテーブルの作成
        manager
            .create_table(
                Table::create()
                    .table(ConsentMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConsentMappings::AuthorizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConsentMappings::AccountId).string().not_null())
                    .col(
                        ColumnDef::new(ConsentMappings::Permission)
                            .string()
                            .not_null(),
                    )
                    // バインド対象リソースの任意ペイロード
                    .col(ColumnDef::new(ConsentMappings::Resource).json_binary())
                    // active / inactive。行は削除されず inactive に倒される
                    .col(
                        ColumnDef::new(ConsentMappings::MappingStatus)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_mappings_authorization_id")
                            .from(ConsentMappings::Table, ConsentMappings::AuthorizationId)
                            .to(ConsentAuthorizations::Table, ConsentAuthorizations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consent_mappings_authorization_id")
                    .table(ConsentMappings::Table)
                    .col(ConsentMappings::AuthorizationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsentMappings::Table).to_owned())
            .await
    }
}

/// Iden Enum for the 'consent_mappings' table and its columns
#[derive(DeriveIden)]
pub enum ConsentMappings {
    Table,
    Id,
    AuthorizationId,
    AccountId,
    Permission,
    Resource,
    MappingStatus,
}

use sea_orm_migration::prelude::*;

use crate::m20260810_000001_create_consents_table::Consents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 認可リソーステーブルの作成
        manager
            .create_table(
                Table::create()
                    .table(ConsentAuthorizations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentAuthorizations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConsentAuthorizations::ConsentId)
                            .uuid()
                            .not_null(),
                    )
                    // ユーザー紐付けまでは NULL
                    .col(ColumnDef::new(ConsentAuthorizations::UserId).string())
                    .col(
                        ColumnDef::new(ConsentAuthorizations::AuthorizationStatus)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAuthorizations::AuthorizationType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAuthorizations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_authorizations_consent_id")
                            .from(
                                ConsentAuthorizations::Table,
                                ConsentAuthorizations::ConsentId,
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
                    .name("idx_consent_authorizations_consent_id")
                    .table(ConsentAuthorizations::Table)
                    .col(ConsentAuthorizations::ConsentId)
                    .to_owned(),
            )
            .await?;

        // ユーザー単位の認可検索用
        manager
            .create_index(
                Index::create()
                    .name("idx_consent_authorizations_user_id")
                    .table(ConsentAuthorizations::Table)
                    .col(ConsentAuthorizations::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsentAuthorizations::Table).to_owned())
            .await
    }
}

/// Iden Enum for the 'consent_authorizations' table and its columns
#[derive(DeriveIden)]
pub enum ConsentAuthorizations {
    Table,
    Id,
    ConsentId,
    UserId,
    AuthorizationStatus,
    AuthorizationType,
    UpdatedAt,
}

use sea_orm_migration::prelude::*;

use crate::m20260810_000001_create_consents_table::Consents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 同意属性テーブルの作成（consent_id + attribute_key の複合主キー）
        manager
            .create_table(
                Table::create()
                    .table(ConsentAttributes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentAttributes::ConsentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAttributes::AttributeKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsentAttributes::AttributeValue)
                            .text()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ConsentAttributes::ConsentId)
                            .col(ConsentAttributes::AttributeKey),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_attributes_consent_id")
                            .from(ConsentAttributes::Table, ConsentAttributes::ConsentId)
                            .to(Consents::Table, Consents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 属性名からの逆引き検索用
        manager
            .create_index(
                Index::create()
                    .name("idx_consent_attributes_key")
                    .table(ConsentAttributes::Table)
                    .col(ConsentAttributes::AttributeKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsentAttributes::Table).to_owned())
            .await
    }
}

/// Iden Enum for the 'consent_attributes' table and its columns
#[derive(DeriveIden)]
pub enum ConsentAttributes {
    Table,
    ConsentId,
    AttributeKey,
    AttributeValue,
}

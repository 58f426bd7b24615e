use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 同意テーブルの作成
        manager
            .create_table(
                Table::create()
                    .table(Consents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Consents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Consents::OrgId).string().not_null())
                    .col(ColumnDef::new(Consents::ClientId).string().not_null())
                    // 同意内容のレシート（不透明なJSONペイロード）
                    .col(ColumnDef::new(Consents::Receipt).json_binary().not_null())
                    .col(ColumnDef::new(Consents::ConsentType).string().not_null())
                    .col(
                        ColumnDef::new(Consents::Frequency)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    // エポック秒。0 は無期限
                    .col(
                        ColumnDef::new(Consents::ValidityPeriod)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Consents::RecurringIndicator)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Consents::CurrentStatus).string().not_null())
                    .col(
                        ColumnDef::new(Consents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Consents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Consents::Table).to_owned())
            .await
    }
}

/// Iden Enum for the 'consents' table and its columns
#[derive(DeriveIden)]
pub enum Consents {
    Table,
    Id,
    OrgId,
    ClientId,
    Receipt,
    ConsentType,
    Frequency,
    ValidityPeriod,
    RecurringIndicator,
    CurrentStatus,
    CreatedAt,
    UpdatedAt,
}

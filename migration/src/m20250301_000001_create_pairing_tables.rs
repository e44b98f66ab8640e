use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(string(Accounts::Id).primary_key())
                    .col(string_null(Accounts::PublicKey))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PairingCodes::Table)
                    .if_not_exists()
                    .col(uuid(PairingCodes::Id).primary_key())
                    .col(string(PairingCodes::OwnerId))
                    .col(timestamp_with_time_zone(PairingCodes::ExpiresAt))
                    .col(timestamp_with_time_zone_null(PairingCodes::UsedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vouchers::Table)
                    .if_not_exists()
                    .col(string(Vouchers::VoucherId).primary_key())
                    .col(string(Vouchers::OwnerId))
                    .col(string(Vouchers::Pubkey))
                    .col(timestamp_with_time_zone(Vouchers::ExpiresAt))
                    .col(timestamp_with_time_zone_null(Vouchers::UsedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Pairings::Table)
                    .if_not_exists()
                    .col(uuid(Pairings::Id).primary_key())
                    .col(string(Pairings::UserLow))
                    .col(string(Pairings::UserHigh))
                    .col(uuid_null(Pairings::SourceCodeId))
                    .col(timestamp_with_time_zone(Pairings::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // 无序对唯一索引：并发 claim 下 at-most-once 插入的根基
        manager
            .create_index(
                Index::create()
                    .name("idx-pairings-user-pair")
                    .table(Pairings::Table)
                    .col(Pairings::UserLow)
                    .col(Pairings::UserHigh)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-pairing-codes-owner")
                    .table(PairingCodes::Table)
                    .col(PairingCodes::OwnerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Pairings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vouchers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PairingCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    PublicKey,
}

#[derive(DeriveIden)]
enum PairingCodes {
    Table,
    Id,
    OwnerId,
    ExpiresAt,
    UsedAt,
}

#[derive(DeriveIden)]
enum Vouchers {
    Table,
    VoucherId,
    OwnerId,
    Pubkey,
    ExpiresAt,
    UsedAt,
}

#[derive(DeriveIden)]
enum Pairings {
    Table,
    Id,
    UserLow,
    UserHigh,
    SourceCodeId,
    CreatedAt,
}

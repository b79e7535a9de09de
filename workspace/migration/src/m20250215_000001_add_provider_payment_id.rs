use crate::entity_iden::EntityIden;
use model::entities::payment;
use model::entities::prelude::*;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Gateway-side identifier, filled in by the first webhook delivery
        manager
            .alter_table(
                Table::alter()
                    .table(Payment::table())
                    .add_column(
                        ColumnDef::new(Payment::column(payment::Column::ProviderPaymentId))
                            .string()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_provider_payment_id")
                    .table(Payment::table())
                    .col(Payment::column(payment::Column::ProviderPaymentId))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_payments_provider_payment_id")
                    .table(Payment::table())
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Payment::table())
                    .drop_column(Payment::column(payment::Column::ProviderPaymentId))
                    .to_owned(),
            )
            .await
    }
}

use sea_orm_migration::{prelude::*, schema::*};

use super::m20250610_000001_feedback_table::Feedback;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Monitoring::Table)
                    .if_not_exists()
                    .col(pk_auto(Monitoring::Id))
                    .col(integer(Monitoring::FeedbackId))
                    .col(timestamp_with_time_zone(Monitoring::Timestamp))
                    .col(double(Monitoring::InferenceTime))
                    .col(boolean(Monitoring::Succes))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monitoring_feedback_id")
                            .from(Monitoring::Table, Monitoring::FeedbackId)
                            .to(Feedback::Table, Feedback::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Monitoring::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Monitoring {
    Table,
    Id,
    FeedbackId,
    Timestamp,
    InferenceTime,
    Succes,
}

use sea_orm_migration::prelude::*;

mod m20250610_000001_feedback_table;
mod m20250610_000002_monitoring_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250610_000001_feedback_table::Migration),
            Box::new(m20250610_000002_monitoring_table::Migration),
        ]
    }
}

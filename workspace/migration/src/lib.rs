pub use sea_orm_migration::prelude::*;

pub mod entity_iden;
mod m20250101_000001_create_table;
mod m20250115_000001_add_enrollments_and_classes;
mod m20250201_000001_add_payments;
mod m20250215_000001_add_provider_payment_id;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_table::Migration),
            Box::new(m20250115_000001_add_enrollments_and_classes::Migration),
            Box::new(m20250201_000001_add_payments::Migration),
            Box::new(m20250215_000001_add_provider_payment_id::Migration),
        ]
    }
}

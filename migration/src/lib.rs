pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20250301_000001_marketplace_tables;
mod m20250301_000002_analytics_tables;
mod m20250315_000001_analytics_dedup;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_marketplace_tables::Migration),
            Box::new(m20250301_000002_analytics_tables::Migration),
            Box::new(m20250315_000001_analytics_dedup::Migration),
        ]
    }
}

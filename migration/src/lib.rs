pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20250301_000001_catalog;
mod m20250301_000002_short_links;
mod m20250301_000003_url_tracking;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_catalog::Migration),
            Box::new(m20250301_000002_short_links::Migration),
            Box::new(m20250301_000003_url_tracking::Migration),
        ]
    }
}

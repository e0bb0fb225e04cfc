//! # Database Migrations
//!
//! Schema migrations live in `migrations/` using the
//! `YYYYMMDDHHMMSS_description.sql` naming convention and are embedded into
//! the binary at compile time. `sqlx` tracks applied versions in its own
//! table and serialises concurrent runners with an advisory lock, so calling
//! [`DatabaseMigrations::run_all`] from several processes is safe.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(pool).await?;
        info!(
            known_migrations = MIGRATOR.iter().count(),
            "Database schema up to date"
        );
        Ok(())
    }
}

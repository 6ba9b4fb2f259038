//! Database connection pool, migrations, and reference-data seeding.
//!
//! One shared Postgres pool backs both the pgmq stream operations and the
//! audit trail tables.

pub mod audit;
pub mod stream;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::{Error, Result};
use crate::model::audit::AuditTag;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Seed the fixed tag vocabulary. Idempotent; run once at startup.
    /// Audit writes fail loudly if this step was skipped.
    pub async fn seed_tags(&self) -> Result<()> {
        for tag in AuditTag::ALL {
            sqlx::query("INSERT INTO audit_tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(tag.as_str())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

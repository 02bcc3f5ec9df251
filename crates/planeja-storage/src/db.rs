//! Database connection and pool management

use planeja_common::config::DatabaseConfig;
use planeja_common::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Database pool wrapper
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = Self::build_url(config)?;
        Self::check_pool_size(config)?;

        info!(
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "Connecting to state database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Build database URL from configuration
    fn build_url(config: &DatabaseConfig) -> Result<String> {
        match config.backend.as_str() {
            "postgres" => config
                .url
                .clone()
                .ok_or_else(|| Error::Config("Database URL required for PostgreSQL".to_string())),
            other => Err(Error::Config(format!(
                "Backend {} does not use a database pool",
                other
            ))),
        }
    }

    /// Pool must hold at least one connection and `min <= max`
    fn check_pool_size(config: &DatabaseConfig) -> Result<()> {
        if config.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }
        if config.min_connections > config.max_connections {
            return Err(Error::Config(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                config.min_connections, config.max_connections
            )));
        }
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_requires_postgres_url() {
        let mut config = DatabaseConfig::default();
        config.backend = "postgres".to_string();
        assert!(DatabasePool::build_url(&config).is_err());

        config.url = Some("postgres://localhost/planeja".to_string());
        assert_eq!(
            DatabasePool::build_url(&config).unwrap(),
            "postgres://localhost/planeja"
        );
    }

    #[test]
    fn test_pool_size_bounds() {
        let mut config = DatabaseConfig::default();
        assert!(DatabasePool::check_pool_size(&config).is_ok());

        config.min_connections = 11;
        assert!(matches!(
            DatabasePool::check_pool_size(&config),
            Err(Error::Config(_))
        ));

        config.min_connections = 0;
        config.max_connections = 0;
        assert!(DatabasePool::check_pool_size(&config).is_err());
    }

    #[test]
    fn test_build_url_rejects_local_backends() {
        let config = DatabaseConfig::default();
        assert!(matches!(
            DatabasePool::build_url(&config),
            Err(Error::Config(_))
        ));
    }
}

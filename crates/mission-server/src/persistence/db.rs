//! Database connection and initialization.

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Database connection wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Initialize the SQLite database.
///
/// Creates the database file if it doesn't exist, runs migrations,
/// and returns a connection pool.
pub async fn init_database(db_path: &str, max_connections: u32) -> Result<Database> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path);

    info!("Connecting to database: {}", db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&db_url)
        .await?;

    run_migrations(&pool).await?;

    Ok(Database { pool })
}

/// Apply the embedded migrations in `migrations/`.
///
/// Applied versions are tracked in `_sqlx_migrations`, so reopening an
/// existing database only runs what is new.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_database() {
        let db = init_database(":memory:", 1).await.unwrap();

        let result: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('missions', 'waypoints', 'annotations', 'no_fly_zones')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();

        assert_eq!(result.0, 4);
    }

    #[tokio::test]
    async fn reopening_applies_migrations_once() {
        let path = std::env::temp_dir()
            .join(format!("mission-db-{}.db", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();

        let first = init_database(&path, 1).await.unwrap();
        sqlx::query("INSERT INTO missions (name, kml_data) VALUES ('kept', '<kml/>')")
            .execute(first.pool())
            .await
            .unwrap();
        first.pool().close().await;

        let second = init_database(&path, 1).await.unwrap();
        let applied: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(second.pool())
            .await
            .unwrap();
        assert_eq!(applied.0, 1);

        let missions: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM missions")
            .fetch_one(second.pool())
            .await
            .unwrap();
        assert_eq!(missions.0, 1);

        second.pool().close().await;
        let _ = std::fs::remove_file(&path);
    }
}

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub type DbPool = SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
  #[error("failed to create data directory: {0}")]
  Io(#[from] std::io::Error),
  #[error("database error: {0}")]
  Sqlx(#[from] sqlx::Error),
  #[error("migration failed: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Explicitly constructed database handle with an open/close lifecycle,
/// owned by the composition root and injected into the store.
pub struct Database {
  pool: DbPool,
}

impl Database {
  /// Open (creating if needed) the database at `path` and run migrations.
  pub async fn open(path: &Path) -> Result<Self, DbError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    tracing::info!(path = %path.display(), "opening database");

    let pool = SqlitePoolOptions::new()
      .max_connections(5)
      .connect(&db_url)
      .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Self { pool })
  }

  /// In-memory database, used by tests and throwaway sessions.
  ///
  /// A single connection keeps every caller on the same in-memory instance;
  /// a larger pool would hand out isolated empty databases.
  pub async fn open_in_memory() -> Result<Self, DbError> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Self { pool })
  }

  pub fn pool(&self) -> &DbPool {
    &self.pool
  }

  pub async fn close(self) {
    self.pool.close().await;
  }
}

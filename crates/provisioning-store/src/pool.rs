use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::{DbError, DbResult};

/// Reused for every unit test as well as `migrate()`. Do not call
/// `sqlx::migrate!` anywhere else — it would embed the migration set a
/// second time.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Opens a SQLite pool at `path`, creating the file if absent. A database
/// missing the migrations bookkeeping table is treated as schema version
/// zero; `auto_migrate` controls whether pending migrations run inline.
pub async fn open_pool(path: &str, auto_migrate: bool) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
        .map_err(|e| DbError::from_query("connect", e))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| DbError::from_query("connect", e))?;

    if auto_migrate {
        migrate(&pool).await?;
    }

    Ok(pool)
}

#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await.map_err(DbError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_pool_auto_migrates_to_current_schema() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let pool = open_pool(path, true).await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM servers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn without_auto_migrate_tables_are_absent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let pool = open_pool(path, false).await.unwrap();

        let result = sqlx::query("SELECT * FROM servers").fetch_optional(&pool).await;
        assert!(result.is_err());
    }
}

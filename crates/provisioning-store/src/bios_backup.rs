use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::{DbError, DbResult};

/// A point-in-time capture of a server's BIOS settings, taken by the
/// `backup_bios` step before applying a new template. Read-only: nothing
/// in this crate replays a backup automatically.
#[derive(Debug, Clone, FromRow)]
pub struct BiosBackup {
    pub id: i64,
    pub server_id: String,
    pub workflow_id: String,
    pub settings_json: String,
    pub created_at: DateTime<Utc>,
}

#[tracing::instrument(skip(pool, settings_json))]
pub async fn record(pool: &SqlitePool, server_id: &str, workflow_id: &str, settings_json: &str) -> DbResult<()> {
    let query = "INSERT INTO bios_backups (server_id, workflow_id, settings_json) VALUES (?, ?, ?)";
    sqlx::query(query)
        .bind(server_id)
        .bind(workflow_id)
        .bind(settings_json)
        .execute(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))?;
    Ok(())
}

#[tracing::instrument(skip(pool))]
pub async fn history_for(pool: &SqlitePool, server_id: &str) -> DbResult<Vec<BiosBackup>> {
    let query = "SELECT id, server_id, workflow_id, settings_json, created_at FROM bios_backups
         WHERE server_id = ? ORDER BY created_at ASC";
    sqlx::query_as(query)
        .bind(server_id)
        .fetch_all(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{migrate, open_pool};
    use crate::servers::Server;

    async fn test_pool() -> SqlitePool {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pool = open_pool(file.path().to_str().unwrap(), false).await.unwrap();
        migrate(&pool).await.unwrap();
        Server::upsert(
            &pool,
            &Server {
                server_id: "srv-1".to_string(),
                status_name: "ready".to_string(),
                is_ready: true,
                ip_address: None,
                ipmi_address: None,
                device_type: None,
            },
        )
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn records_accumulate_and_are_ordered() {
        let pool = test_pool().await;
        record(&pool, "srv-1", "wf-1", r#"{"BootMode":"Uefi"}"#).await.unwrap();
        record(&pool, "srv-1", "wf-2", r#"{"BootMode":"Legacy"}"#).await.unwrap();

        let history = history_for(&pool, "srv-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].workflow_id, "wf-1");
        assert_eq!(history[1].workflow_id, "wf-2");
    }
}

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, FromRow)]
pub struct PowerStateRecord {
    pub id: i64,
    pub server_id: String,
    pub state: String,
    pub changed_at: DateTime<Utc>,
}

#[tracing::instrument(skip(pool))]
pub async fn record(pool: &SqlitePool, server_id: &str, state: &str) -> DbResult<()> {
    let query = "INSERT INTO power_state_history (server_id, state) VALUES (?, ?)";
    sqlx::query(query)
        .bind(server_id)
        .bind(state)
        .execute(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))?;
    Ok(())
}

#[tracing::instrument(skip(pool))]
pub async fn history_for(pool: &SqlitePool, server_id: &str) -> DbResult<Vec<PowerStateRecord>> {
    let query = "SELECT id, server_id, state, changed_at FROM power_state_history WHERE server_id = ? ORDER BY changed_at ASC";
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
    async fn records_accumulate_in_order() {
        let pool = test_pool().await;
        record(&pool, "srv-1", "off").await.unwrap();
        record(&pool, "srv-1", "on").await.unwrap();

        let history = history_for(&pool, "srv-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].state, "off");
        assert_eq!(history[1].state, "on");
    }
}

use sqlx::{FromRow, SqlitePool};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, FromRow)]
pub struct Server {
    pub server_id: String,
    pub status_name: String,
    pub is_ready: bool,
    pub ip_address: Option<String>,
    pub ipmi_address: Option<String>,
    pub device_type: Option<String>,
}

impl Server {
    #[tracing::instrument(skip(pool))]
    pub async fn upsert(pool: &SqlitePool, server: &Server) -> DbResult<()> {
        let query = "INSERT INTO servers (server_id, status_name, is_ready, ip_address, ipmi_address, device_type)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(server_id) DO UPDATE SET
                status_name = excluded.status_name,
                is_ready = excluded.is_ready,
                ip_address = excluded.ip_address,
                ipmi_address = excluded.ipmi_address,
                device_type = excluded.device_type,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

        sqlx::query(query)
            .bind(&server.server_id)
            .bind(&server.status_name)
            .bind(server.is_ready)
            .bind(&server.ip_address)
            .bind(&server.ipmi_address)
            .bind(&server.device_type)
            .execute(pool)
            .await
            .map_err(|e| DbError::from_query(query, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn find(pool: &SqlitePool, server_id: &str) -> DbResult<Server> {
        let query = "SELECT server_id, status_name, is_ready, ip_address, ipmi_address, device_type FROM servers WHERE server_id = ?";
        sqlx::query_as(query)
            .bind(server_id)
            .fetch_one(pool)
            .await
            .map_err(|e| DbError::from_query(query, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{migrate, open_pool};

    async fn test_pool() -> SqlitePool {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pool = open_pool(file.path().to_str().unwrap(), false).await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips() {
        let pool = test_pool().await;
        let server = Server {
            server_id: "srv-1".to_string(),
            status_name: "ready".to_string(),
            is_ready: true,
            ip_address: Some("10.0.0.5".to_string()),
            ipmi_address: Some("10.0.1.5".to_string()),
            device_type: Some("a1.c5.large".to_string()),
        };
        Server::upsert(&pool, &server).await.unwrap();

        let fetched = Server::find(&pool, "srv-1").await.unwrap();
        assert_eq!(fetched.status_name, "ready");
        assert!(fetched.is_ready);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_updates_fields() {
        let pool = test_pool().await;
        let mut server = Server {
            server_id: "srv-1".to_string(),
            status_name: "new".to_string(),
            is_ready: false,
            ip_address: None,
            ipmi_address: None,
            device_type: None,
        };
        Server::upsert(&pool, &server).await.unwrap();
        server.status_name = "commissioning".to_string();
        server.is_ready = true;
        Server::upsert(&pool, &server).await.unwrap();

        let fetched = Server::find(&pool, "srv-1").await.unwrap();
        assert_eq!(fetched.status_name, "commissioning");
        assert!(fetched.is_ready);
    }

    #[tokio::test]
    async fn missing_server_is_not_found() {
        let pool = test_pool().await;
        assert!(matches!(Server::find(&pool, "nope").await, Err(DbError::NotFound)));
    }
}

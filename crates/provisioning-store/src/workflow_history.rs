use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use workflow::{StepStatus, WorkflowInstance, WorkflowPersistence, WorkflowStatus};

use crate::error::{DbError, DbResult};

/// A `workflow_history` row, for callers (the CLI's `workflow status` /
/// `workflow list` commands) that have no live [`WorkflowInstance`] to
/// read because they run in a process other than the one driving the
/// workflow.
#[derive(Debug, Clone, FromRow)]
pub struct WorkflowHistoryRow {
    pub workflow_id: String,
    pub server_id: String,
    pub device_type: Option<String>,
    pub status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub steps_completed: i64,
    pub total_steps: i64,
    pub error_message: Option<String>,
    pub metadata_json: Option<String>,
}

/// Looks up one workflow's last-persisted row by id.
pub async fn find(pool: &SqlitePool, workflow_id: &str) -> DbResult<Option<WorkflowHistoryRow>> {
    let query = "SELECT * FROM workflow_history WHERE workflow_id = ?";
    sqlx::query_as(query)
        .bind(workflow_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))
}

/// Every workflow row not yet in a terminal status.
pub async fn list_active(pool: &SqlitePool) -> DbResult<Vec<WorkflowHistoryRow>> {
    let query = "SELECT * FROM workflow_history WHERE status NOT IN ('completed', 'failed', 'cancelled')";
    sqlx::query_as(query)
        .fetch_all(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))
}

fn status_name(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Pending => "pending",
        WorkflowStatus::Running => "running",
        WorkflowStatus::Completed => "completed",
        WorkflowStatus::Failed => "failed",
        WorkflowStatus::Cancelled => "cancelled",
    }
}

fn metadata_json(instance: &WorkflowInstance) -> String {
    let steps: Vec<serde_json::Value> = instance
        .steps
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "status": format!("{:?}", s.status),
                "attempt": s.attempt,
            })
        })
        .collect();
    serde_json::json!({ "steps": steps, "failure_kind": instance.failure_kind }).to_string()
}

#[tracing::instrument(skip(pool, instance))]
async fn insert(pool: &SqlitePool, server_id: &str, device_type: Option<&str>, instance: &WorkflowInstance) -> DbResult<()> {
    let query = "INSERT INTO workflow_history
            (workflow_id, server_id, device_type, status, started_at, steps_completed, total_steps, metadata_json)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)";
    sqlx::query(query)
        .bind(&instance.id)
        .bind(server_id)
        .bind(device_type)
        .bind(status_name(instance.status))
        .bind(instance.start_time)
        .bind(instance.completed_step_count() as i64)
        .bind(instance.steps.len() as i64)
        .bind(metadata_json(instance))
        .execute(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))?;
    Ok(())
}

#[tracing::instrument(skip(pool, instance))]
async fn update(pool: &SqlitePool, instance: &WorkflowInstance) -> DbResult<()> {
    let query = "UPDATE workflow_history SET
            status = ?, steps_completed = ?, completed_at = ?, error_message = ?, metadata_json = ?
         WHERE workflow_id = ?";
    sqlx::query(query)
        .bind(status_name(instance.status))
        .bind(instance.completed_step_count() as i64)
        .bind(instance.end_time)
        .bind(&instance.error)
        .bind(metadata_json(instance))
        .bind(&instance.id)
        .execute(pool)
        .await
        .map_err(|e| DbError::from_query(query, e))?;
    Ok(())
}

/// Persists `WorkflowInstance` transitions to `workflow_history`: the
/// first transition into `running` inserts the row, every later
/// transition updates it in place.
pub struct SqliteWorkflowPersistence {
    pool: SqlitePool,
    server_id: String,
    device_type: Option<String>,
}

impl SqliteWorkflowPersistence {
    pub fn new(pool: SqlitePool, server_id: impl Into<String>, device_type: Option<String>) -> Self {
        Self {
            pool,
            server_id: server_id.into(),
            device_type,
        }
    }
}

#[async_trait]
impl WorkflowPersistence for SqliteWorkflowPersistence {
    async fn on_transition(&self, instance: &WorkflowInstance) {
        let already_running_or_past = instance
            .steps
            .iter()
            .any(|s| s.status != StepStatus::Pending)
            || instance.status != WorkflowStatus::Running;

        let result = if already_running_or_past {
            update(&self.pool, instance).await
        } else {
            insert(&self.pool, &self.server_id, self.device_type.as_deref(), instance).await
        };

        if let Err(e) = result {
            tracing::warn!(workflow_id = %instance.id, error = %e, "failed to persist workflow transition");
        }
    }
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
    async fn first_transition_inserts_subsequent_update() {
        let pool = test_pool().await;
        let persistence = SqliteWorkflowPersistence::new(pool.clone(), "srv-1", Some("a1.c5.large".to_string()));

        let mut instance = WorkflowInstance::new("wf-1", &["validate".to_string()]);
        instance.transition(WorkflowStatus::Running);
        instance.start_time = Some(chrono::Utc::now());
        persistence.on_transition(&instance).await;

        instance.transition(WorkflowStatus::Completed);
        instance.end_time = Some(chrono::Utc::now());
        persistence.on_transition(&instance).await;

        let row: (String,) = sqlx::query_as("SELECT status FROM workflow_history WHERE workflow_id = 'wf-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, "completed");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workflow_history WHERE workflow_id = 'wf-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn find_and_list_active_reflect_persisted_rows() {
        let pool = test_pool().await;
        let persistence = SqliteWorkflowPersistence::new(pool.clone(), "srv-1", None);

        let mut running = WorkflowInstance::new("wf-running", &["validate".to_string()]);
        running.transition(WorkflowStatus::Running);
        persistence.on_transition(&running).await;

        let mut done = WorkflowInstance::new("wf-done", &["validate".to_string()]);
        done.transition(WorkflowStatus::Running);
        persistence.on_transition(&done).await;
        done.transition(WorkflowStatus::Completed);
        persistence.on_transition(&done).await;

        let found = find(&pool, "wf-running").await.unwrap().expect("row present");
        assert_eq!(found.status, "running");

        let active = list_active(&pool).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].workflow_id, "wf-running");

        assert!(find(&pool, "does-not-exist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failure_kind_is_persisted_into_metadata_json() {
        let pool = test_pool().await;
        let persistence = SqliteWorkflowPersistence::new(pool.clone(), "srv-1", None);

        let mut instance = WorkflowInstance::new("wf-critical", &["apply_firmware".to_string()]);
        instance.transition(WorkflowStatus::Running);
        persistence.on_transition(&instance).await;

        instance.transition(WorkflowStatus::Failed);
        instance.error = Some("critical firmware update failed".to_string());
        instance.failure_kind = Some("FirmwareCriticalError".to_string());
        persistence.on_transition(&instance).await;

        let row = find(&pool, "wf-critical").await.unwrap().expect("row present");
        let metadata: serde_json::Value = serde_json::from_str(&row.metadata_json.expect("metadata present")).unwrap();
        assert_eq!(metadata["failure_kind"], "FirmwareCriticalError");
    }
}

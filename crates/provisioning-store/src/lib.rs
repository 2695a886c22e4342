//! Schema-versioned SQLite persistence for server records, workflow run
//! history, and power-state transitions.

mod bios_backup;
mod error;
mod pool;
mod power_state_history;
mod servers;
mod workflow_history;

pub use bios_backup::{history_for as bios_backup_history_for, record as record_bios_backup, BiosBackup};
pub use error::{DbError, DbResult};
pub use pool::{migrate, open_pool, MIGRATOR};
pub use power_state_history::{history_for as power_state_history_for, record as record_power_state, PowerStateRecord};
pub use servers::Server;
pub use workflow_history::{find as find_workflow, list_active as list_active_workflows, SqliteWorkflowPersistence, WorkflowHistoryRow};

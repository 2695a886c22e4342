mod cli;
mod controller;
mod handlers;
mod runtime_config;
mod sessions;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, WorkflowAction};
use config::ConfigResolver;
use controller::{Controller, WorkflowParams};
use firmware::FirmwarePolicy;
use maas::{FilesystemFirmwareRepository, MockMaasClient, StaticCredentialsProvider};
use runtime_config::RuntimeConfig;
use sessions::SshSessionFactory;
use tracing_subscriber::EnvFilter;

const DEVICE_MAPPINGS_PATH: &str = "config/device_mappings.yaml";
const BIOS_TEMPLATES_PATH: &str = "config/bios_templates.yaml";
const FIRMWARE_TEMPLATES_PATH: &str = "config/firmware_templates.yaml";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let runtime_config: RuntimeConfig = runtime_config::load(&cli.config).context("loading provisiond configuration")?;

    match cli.command {
        Command::Migrate => {
            let pool = store::open_pool(&runtime_config.database.path, false)
                .await
                .context("opening database")?;
            store::migrate(&pool).await.context("running migrations")?;
            tracing::info!("migrations applied");
        }
        Command::Run => {
            let pool = store::open_pool(&runtime_config.database.path, runtime_config.database.auto_migrate)
                .await
                .context("opening database")?;
            let _controller = build_controller(&runtime_config, pool).await?;
            tracing::info!("provisiond ready; awaiting shutdown signal");
            tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
            tracing::info!("provisiond shutting down");
        }
        Command::Workflow { action } => run_workflow_action(&runtime_config, action).await?,
    }

    Ok(())
}

/// Loads the three YAML documents (device mappings, BIOS templates,
/// firmware templates) that `resolve_profile`/`classify_device` need.
/// Each is optional on disk — an unprovisioned dev environment simply
/// gets empty classification/profile data rather than failing startup.
async fn build_resolver() -> Result<Arc<ConfigResolver>> {
    let mut resolver = ConfigResolver::new();
    if Path::new(DEVICE_MAPPINGS_PATH).exists() {
        let yaml = tokio::fs::read_to_string(DEVICE_MAPPINGS_PATH).await?;
        resolver.load_device_mappings(&yaml)?;
    }
    if Path::new(BIOS_TEMPLATES_PATH).exists() {
        let yaml = tokio::fs::read_to_string(BIOS_TEMPLATES_PATH).await?;
        resolver.load_bios_templates(&yaml)?;
    }
    if Path::new(FIRMWARE_TEMPLATES_PATH).exists() {
        let yaml = tokio::fs::read_to_string(FIRMWARE_TEMPLATES_PATH).await?;
        resolver.load_firmware_templates(&yaml)?;
    }
    Ok(Arc::new(resolver))
}

/// Wires a [`Controller`] from runtime config plus the three on-disk YAML
/// documents. This workspace's `MaasClient` and `FirmwareRepository` have
/// no production HTTP implementation (see `DESIGN.md`); `run` and
/// `workflow` both use the in-memory MaaS mock and a filesystem-backed
/// firmware repository rooted at `./firmware`.
async fn build_controller(runtime_config: &RuntimeConfig, pool: sqlx::SqlitePool) -> Result<Controller> {
    let resolver = build_resolver().await.context("loading device/bios/firmware config")?;

    let maas = Arc::new(MockMaasClient::new(Vec::new()));
    let credentials = Arc::new(StaticCredentialsProvider::new(maas::Credentials {
        username: runtime_config.ssh.username.clone(),
        password: String::new(),
        ssh_key: None,
    }));
    let firmware_repository = Arc::new(FilesystemFirmwareRepository::new("firmware"));
    let session_factory = Arc::new(SshSessionFactory {
        ssh_timeout: Duration::from_secs(runtime_config.ssh.timeout_seconds),
    });

    Ok(Controller::new(
        pool,
        maas,
        credentials,
        firmware_repository,
        resolver,
        session_factory,
        FirmwarePolicy::Recommended,
        runtime_config.workflow.history_events_per_instance,
    ))
}

/// Drives the `workflow` subcommand tree. There is no long-lived daemon
/// process in this workspace for the CLI to talk to, so `start` creates,
/// starts, and polls a workflow to completion within this one invocation;
/// `status` and `list` instead read back the `workflow_history` table,
/// which is the only state visible across separate process invocations.
async fn run_workflow_action(runtime_config: &RuntimeConfig, action: WorkflowAction) -> Result<()> {
    let pool = store::open_pool(&runtime_config.database.path, runtime_config.database.auto_migrate)
        .await
        .context("opening database")?;

    match action {
        WorkflowAction::Start {
            template,
            server_id,
            device_type,
            target_ipmi_ip,
            gateway,
            subnet_mask,
            policy,
            reset_bios_to_defaults,
        } => {
            let controller = build_controller(runtime_config, pool).await?;
            let params = WorkflowParams {
                server_id,
                device_type,
                target_ipmi_ip,
                gateway,
                subnet_mask,
                policy,
                reset_bios_to_defaults,
            };
            let workflow_id = controller.create_workflow(&template, params)?;
            controller.start_workflow(&workflow_id).await?;

            loop {
                let snapshot = controller.get_workflow(&workflow_id)?;
                if matches!(snapshot.status.as_str(), "completed" | "failed" | "cancelled") {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                    break;
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
        WorkflowAction::Status { workflow_id } => {
            let row = store::find_workflow(&pool, &workflow_id)
                .await
                .context("reading workflow status")?
                .with_context(|| format!("no such workflow: {workflow_id}"))?;
            println!("{}", serde_json::to_string_pretty(&row_as_json(&row))?);
        }
        WorkflowAction::Cancel { workflow_id } => {
            let row = store::find_workflow(&pool, &workflow_id)
                .await
                .context("reading workflow status")?
                .with_context(|| format!("no such workflow: {workflow_id}"))?;
            if matches!(row.status.as_str(), "completed" | "failed" | "cancelled") {
                println!("workflow {workflow_id} is already {}; nothing to cancel", row.status);
            } else {
                println!(
                    "workflow {workflow_id} has no running `provisiond workflow start` process in this invocation to signal; cancellation only takes effect on the process driving the run"
                );
            }
        }
        WorkflowAction::List => {
            let rows = store::list_active_workflows(&pool).await.context("listing workflows")?;
            let values: Vec<_> = rows.iter().map(row_as_json).collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
    }

    Ok(())
}

fn row_as_json(row: &store::WorkflowHistoryRow) -> serde_json::Value {
    serde_json::json!({
        "workflow_id": row.workflow_id,
        "server_id": row.server_id,
        "device_type": row.device_type,
        "status": row.status,
        "started_at": row.started_at,
        "completed_at": row.completed_at,
        "steps_completed": row.steps_completed,
        "total_steps": row.total_steps,
        "error_message": row.error_message,
    })
}

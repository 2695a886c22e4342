use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "provisiond", about = "Bare-metal server provisioning workflow engine")]
pub struct Cli {
    #[arg(long, env = "PROVISIOND_CONFIG", default_value = "provisiond.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the provisioning engine, accepting workflow commands until interrupted.
    Run,
    /// Applies pending database migrations and exits.
    Migrate,
    /// Workflow lifecycle commands against a running instance's database.
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowAction {
    /// Starts a new workflow run from a named template.
    Start {
        #[arg(long)]
        template: String,
        #[arg(long)]
        server_id: String,
        #[arg(long)]
        device_type: Option<String>,
        #[arg(long)]
        target_ipmi_ip: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
        #[arg(long)]
        subnet_mask: Option<String>,
        #[arg(long)]
        policy: Option<String>,
        /// Resets BIOS settings to factory defaults instead of applying the
        /// device's template.
        #[arg(long)]
        reset_bios_to_defaults: bool,
    },
    /// Prints the current status snapshot of one workflow as JSON.
    Status {
        workflow_id: String,
    },
    /// Requests cancellation of a running workflow.
    Cancel {
        workflow_id: String,
    },
    /// Lists every workflow that hasn't reached a terminal state.
    List,
}

//! Remote execution surfaces used by discovery, BIOS, and firmware
//! components: a command-execution session over SSH and a typed Redfish
//! session. Both are traits so that production code never has to special
//! case tests — every caller takes `&dyn ExecSession` / `&dyn RedfishSession`.

pub mod exec;
pub mod redfish;

pub use exec::{ExecError, ExecOutput, ExecSession, LocalExecSession, SshExecSession};
pub use redfish::{
    MockRedfishSession, PowerAction, RedfishError, RedfishSession, RedfishTask, TaskState,
};

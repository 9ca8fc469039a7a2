//! CRUD resource adapters.
//!
//! Each adapter translates a declarative configuration into a sequence
//! of control-plane calls: decode the opaque state ID, decide which
//! side effects the change set requires, apply them in dependency
//! order, await each long-running operation, and re-read the resulting
//! server state.

pub mod extension;
pub mod virtual_machine;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-operation timeout budget.
///
/// Every control-plane wait inside an operation draws on the budget of
/// that operation kind; expiry surfaces as a terminal error, not a
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(45 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(45 * 60),
            delete: Duration::from_secs(45 * 60),
        }
    }
}

/// Behavior toggles for the virtual machine adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachineFeatures {
    /// Ask the guest OS to shut down cleanly before a delete powers the
    /// VM off. Off by default: the power-off preceding a delete exists
    /// to stop billing, not to preserve guest state.
    pub graceful_shutdown: bool,
    /// Also delete the OS disk when the VM is deleted.
    pub delete_os_disk_on_deletion: bool,
}

impl Default for VirtualMachineFeatures {
    fn default() -> Self {
        Self {
            graceful_shutdown: false,
            delete_os_disk_on_deletion: true,
        }
    }
}

//! Linux virtual machine resource adapter.
//!
//! The adapter owns the full lifecycle: create with pre-network
//! validation, read with connection-info resolution, an update
//! orchestrator that powers the machine down only when the change set
//! requires it, and a delete that confirms the control plane has
//! stopped reporting the machine before declaring success.

mod connection;
mod create;
mod delete;
mod read;
mod update;

pub use connection::{parse_username_from_authorized_keys_path, ConnectionInfo};
pub use read::VirtualMachineState;
pub use update::VirtualMachineChanges;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::models::{EvictionPolicy, Priority, VirtualMachineInstanceView};
use crate::api::{
    DisksApi, NetworkInterfacesApi, PublicIpAddressesApi, VirtualMachinesApi, WaitOptions,
};
use crate::error::{Error, Result};
use crate::locks::LockRegistry;
use crate::resources::{OperationTimeouts, VirtualMachineFeatures};

fn default_true() -> bool {
    true
}

fn default_extensions_time_budget() -> String {
    "PT1H30M".to_string()
}

// A negative price means "pay up to the current on-demand price".
fn default_max_bid_price() -> f64 {
    -1.0
}

/// An SSH public key installed for a user. The key lands in
/// `/home/<username>/.ssh/authorized_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSshKey {
    pub username: String,
    pub public_key: String,
}

impl AdminSshKey {
    pub fn authorized_keys_path(&self) -> String {
        format!("/home/{}/.ssh/authorized_keys", self.username)
    }
}

/// Desired OS disk settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsDiskConfig {
    pub caching: String,
    pub storage_account_type: String,
    /// Left unset, the platform names the disk.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub disk_size_gb: Option<u32>,
    #[serde(default)]
    pub disk_encryption_set_id: Option<String>,
    /// Host-local ephemeral disk. Such machines cannot be deallocated.
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub write_accelerator_enabled: bool,
}

/// Marketplace/platform image coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

/// Managed identity to assign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(rename = "type")]
    pub identity_type: String,
    #[serde(default)]
    pub identity_ids: Vec<String>,
}

/// Boot diagnostics target. An unset storage URI selects the managed
/// storage account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootDiagnosticsConfig {
    #[serde(default)]
    pub storage_account_uri: Option<String>,
}

/// Certificates to install from a Key Vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretConfig {
    pub key_vault_id: String,
    pub certificate_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCapabilitiesConfig {
    #[serde(default)]
    pub ultra_ssd_enabled: bool,
}

/// Desired configuration of a Linux virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineConfig {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub size: String,
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_true")]
    pub disable_password_authentication: bool,
    #[serde(default)]
    pub admin_ssh_keys: Vec<AdminSshKey>,
    pub network_interface_ids: Vec<String>,
    pub os_disk: OsDiskConfig,
    #[serde(default)]
    pub source_image_id: Option<String>,
    #[serde(default)]
    pub source_image_reference: Option<SourceImageReference>,
    /// Hostname inside the guest; defaults to the resource name.
    #[serde(default)]
    pub computer_name: Option<String>,
    /// Base64-encoded cloud-init or similar payload.
    #[serde(default)]
    pub custom_data: Option<String>,
    #[serde(default)]
    pub identity: Option<IdentityConfig>,
    #[serde(default)]
    pub boot_diagnostics: Option<BootDiagnosticsConfig>,
    #[serde(default)]
    pub secrets: Vec<SecretConfig>,
    #[serde(default)]
    pub availability_set_id: Option<String>,
    #[serde(default)]
    pub dedicated_host_id: Option<String>,
    #[serde(default)]
    pub proximity_placement_group_id: Option<String>,
    #[serde(default)]
    pub virtual_machine_scale_set_id: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub eviction_policy: Option<EvictionPolicy>,
    #[serde(default = "default_max_bid_price")]
    pub max_bid_price: f64,
    #[serde(default = "default_true")]
    pub provision_vm_agent: bool,
    #[serde(default = "default_true")]
    pub allow_extension_operations: bool,
    #[serde(default = "default_extensions_time_budget")]
    pub extensions_time_budget: String,
    #[serde(default)]
    pub additional_capabilities: Option<AdditionalCapabilitiesConfig>,
    #[serde(default)]
    pub encryption_at_host_enabled: bool,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl VirtualMachineConfig {
    /// Cross-field validation, performed before any network call.
    pub fn validate(&self) -> Result<()> {
        if self.priority == Priority::Spot {
            if self.eviction_policy.is_none() {
                return Err(Error::validation(
                    "eviction_policy",
                    "an `eviction_policy` must be specified when `priority` is set to `Spot`",
                ));
            }
        } else {
            if self.eviction_policy.is_some() {
                return Err(Error::validation(
                    "eviction_policy",
                    "an `eviction_policy` can only be specified when `priority` is set to `Spot`",
                ));
            }
            if self.max_bid_price > 0.0 {
                return Err(Error::validation(
                    "max_bid_price",
                    "`max_bid_price` can only be configured when `priority` is set to `Spot`",
                ));
            }
        }

        if self.disable_password_authentication {
            if self.admin_ssh_keys.is_empty() {
                return Err(Error::validation(
                    "admin_ssh_keys",
                    "at least one SSH key must be specified when `disable_password_authentication` is set to `true`",
                ));
            }
        } else if self.admin_password.is_none() {
            return Err(Error::validation(
                "admin_password",
                "an `admin_password` must be specified when `disable_password_authentication` is set to `false`",
            ));
        }

        if self.allow_extension_operations && !self.provision_vm_agent {
            return Err(Error::validation(
                "allow_extension_operations",
                "`allow_extension_operations` cannot be set to `true` when `provision_vm_agent` is set to `false`",
            ));
        }

        match (&self.source_image_id, &self.source_image_reference) {
            (None, None) => {
                return Err(Error::validation(
                    "source_image_id",
                    "one of `source_image_id` or `source_image_reference` must be set",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "source_image_id",
                    "only one of `source_image_id` and `source_image_reference` can be set",
                ));
            }
            _ => {}
        }

        if self.network_interface_ids.is_empty() {
            return Err(Error::validation(
                "network_interface_ids",
                "at least one network interface must be attached",
            ));
        }

        Ok(())
    }

    pub(crate) fn computer_name(&self) -> &str {
        self.computer_name.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn ultra_ssd_enabled(&self) -> bool {
        self.additional_capabilities
            .as_ref()
            .map(|c| c.ultra_ssd_enabled)
            .unwrap_or(false)
    }
}

/// Power state of a machine, as reported by its instance view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown(String),
}

impl PowerState {
    /// Extracts a power state from an instance view status code. Codes
    /// carry a `PowerState/` prefix and are matched case-insensitively;
    /// codes for other status families yield `None`.
    pub fn from_status_code(code: &str) -> Option<Self> {
        let lowered = code.to_lowercase();
        let state = lowered.strip_prefix("powerstate/")?;
        Some(match state {
            "starting" => PowerState::Starting,
            "running" => PowerState::Running,
            "stopping" => PowerState::Stopping,
            "stopped" => PowerState::Stopped,
            "deallocating" => PowerState::Deallocating,
            "deallocated" => PowerState::Deallocated,
            other => PowerState::Unknown(other.to_string()),
        })
    }
}

/// True when the instance view reports the machine as running.
pub(crate) fn should_be_started(view: &VirtualMachineInstanceView) -> bool {
    view.statuses
        .iter()
        .flatten()
        .filter_map(|status| status.code.as_deref())
        .filter_map(PowerState::from_status_code)
        .any(|state| state == PowerState::Running)
}

/// The virtual machine resource adapter.
///
/// Holds the control-plane clients and the per-name lock registry. All
/// mutating operations serialize on the machine name, so an update and
/// a delete for the same machine never interleave.
pub struct VirtualMachineResource {
    pub(crate) virtual_machines: Arc<dyn VirtualMachinesApi>,
    pub(crate) disks: Arc<dyn DisksApi>,
    pub(crate) network_interfaces: Arc<dyn NetworkInterfacesApi>,
    pub(crate) public_ips: Arc<dyn PublicIpAddressesApi>,
    pub(crate) locks: Arc<LockRegistry>,
    pub(crate) subscription_id: String,
    pub(crate) features: VirtualMachineFeatures,
    pub(crate) timeouts: OperationTimeouts,
    pub(crate) poll_interval: Duration,
    pub(crate) delete_poll_interval: Duration,
}

impl VirtualMachineResource {
    pub fn new(
        virtual_machines: Arc<dyn VirtualMachinesApi>,
        disks: Arc<dyn DisksApi>,
        network_interfaces: Arc<dyn NetworkInterfacesApi>,
        public_ips: Arc<dyn PublicIpAddressesApi>,
        locks: Arc<LockRegistry>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            virtual_machines,
            disks,
            network_interfaces,
            public_ips,
            locks,
            subscription_id: subscription_id.into(),
            features: VirtualMachineFeatures::default(),
            timeouts: OperationTimeouts::default(),
            poll_interval: Duration::from_secs(10),
            delete_poll_interval: Duration::from_secs(30),
        }
    }

    pub fn with_features(mut self, features: VirtualMachineFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Interval between status polls for long-running operations.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Interval between observations while confirming a delete.
    pub fn with_delete_poll_interval(mut self, interval: Duration) -> Self {
        self.delete_poll_interval = interval;
        self
    }

    pub(crate) fn wait_options(&self, timeout: Duration) -> WaitOptions {
        WaitOptions {
            timeout,
            poll_interval: self.poll_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::InstanceViewStatus;

    pub(crate) fn base_config() -> VirtualMachineConfig {
        VirtualMachineConfig {
            name: "machine1".to_string(),
            resource_group: "group1".to_string(),
            location: "westeurope".to_string(),
            size: "Standard_F2".to_string(),
            admin_username: "adminuser".to_string(),
            admin_password: None,
            disable_password_authentication: true,
            admin_ssh_keys: vec![AdminSshKey {
                username: "adminuser".to_string(),
                public_key: "ssh-rsa AAAAB3...".to_string(),
            }],
            network_interface_ids: vec![
                "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/group1/providers/Microsoft.Network/networkInterfaces/nic1".to_string(),
            ],
            os_disk: OsDiskConfig {
                caching: "ReadWrite".to_string(),
                storage_account_type: "Premium_LRS".to_string(),
                name: None,
                disk_size_gb: None,
                disk_encryption_set_id: None,
                ephemeral: false,
                write_accelerator_enabled: false,
            },
            source_image_id: None,
            source_image_reference: Some(SourceImageReference {
                publisher: "Canonical".to_string(),
                offer: "UbuntuServer".to_string(),
                sku: "18.04-LTS".to_string(),
                version: "latest".to_string(),
            }),
            computer_name: None,
            custom_data: None,
            identity: None,
            boot_diagnostics: None,
            secrets: Vec::new(),
            availability_set_id: None,
            dedicated_host_id: None,
            proximity_placement_group_id: None,
            virtual_machine_scale_set_id: None,
            zone: None,
            priority: Priority::Regular,
            eviction_policy: None,
            max_bid_price: -1.0,
            provision_vm_agent: true,
            allow_extension_operations: true,
            extensions_time_budget: "PT1H30M".to_string(),
            additional_capabilities: None,
            encryption_at_host_enabled: false,
            tags: HashMap::new(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        base_config().validate().unwrap();
    }

    #[test]
    fn test_spot_requires_eviction_policy() {
        let mut config = base_config();
        config.priority = Priority::Spot;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("eviction_policy"));

        config.eviction_policy = Some(EvictionPolicy::Deallocate);
        config.validate().unwrap();
    }

    #[test]
    fn test_eviction_policy_requires_spot() {
        let mut config = base_config();
        config.eviction_policy = Some(EvictionPolicy::Delete);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Spot"));
    }

    #[test]
    fn test_max_bid_price_requires_spot() {
        let mut config = base_config();
        config.max_bid_price = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_bid_price"));

        config.priority = Priority::Spot;
        config.eviction_policy = Some(EvictionPolicy::Deallocate);
        config.validate().unwrap();
    }

    #[test]
    fn test_password_auth_disabled_requires_ssh_key() {
        let mut config = base_config();
        config.admin_ssh_keys.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SSH key"));
    }

    #[test]
    fn test_password_auth_enabled_requires_password() {
        let mut config = base_config();
        config.disable_password_authentication = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("admin_password"));

        config.admin_password = Some("Password1234!".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_extension_operations_require_vm_agent() {
        let mut config = base_config();
        config.provision_vm_agent = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("allow_extension_operations"));

        config.allow_extension_operations = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_exactly_one_image_source() {
        let mut config = base_config();
        config.source_image_reference = None;
        assert!(config.validate().is_err());

        config.source_image_id = Some("/image/id".to_string());
        config.validate().unwrap();

        config.source_image_reference = Some(SourceImageReference {
            publisher: "Canonical".to_string(),
            offer: "UbuntuServer".to_string(),
            sku: "18.04-LTS".to_string(),
            version: "latest".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_computer_name_defaults_to_resource_name() {
        let mut config = base_config();
        assert_eq!(config.computer_name(), "machine1");
        config.computer_name = Some("host1".to_string());
        assert_eq!(config.computer_name(), "host1");
    }

    #[test]
    fn test_power_state_from_status_code() {
        assert_eq!(
            PowerState::from_status_code("PowerState/running"),
            Some(PowerState::Running)
        );
        assert_eq!(
            PowerState::from_status_code("POWERSTATE/Deallocated"),
            Some(PowerState::Deallocated)
        );
        assert_eq!(
            PowerState::from_status_code("ProvisioningState/succeeded"),
            None
        );
        assert_eq!(
            PowerState::from_status_code("PowerState/hibernated"),
            Some(PowerState::Unknown("hibernated".to_string()))
        );
    }

    #[test]
    fn test_should_be_started() {
        let view = VirtualMachineInstanceView {
            statuses: Some(vec![
                InstanceViewStatus {
                    code: Some("ProvisioningState/succeeded".to_string()),
                    ..Default::default()
                },
                InstanceViewStatus {
                    code: Some("PowerState/running".to_string()),
                    ..Default::default()
                },
            ]),
        };
        assert!(should_be_started(&view));

        let stopped = VirtualMachineInstanceView {
            statuses: Some(vec![InstanceViewStatus {
                code: Some("PowerState/stopped".to_string()),
                ..Default::default()
            }]),
        };
        assert!(!should_be_started(&stopped));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let raw = serde_json::json!({
            "name": "machine1",
            "resource_group": "group1",
            "location": "westeurope",
            "size": "Standard_F2",
            "admin_username": "adminuser",
            "admin_ssh_keys": [
                { "username": "adminuser", "public_key": "ssh-rsa AAAAB3..." }
            ],
            "network_interface_ids": ["/some/nic/id"],
            "os_disk": {
                "caching": "ReadWrite",
                "storage_account_type": "Standard_LRS"
            },
            "source_image_reference": {
                "publisher": "Canonical",
                "offer": "UbuntuServer",
                "sku": "18.04-LTS",
                "version": "latest"
            }
        });
        let config: VirtualMachineConfig = serde_json::from_value(raw).unwrap();
        assert!(config.disable_password_authentication);
        assert!(config.provision_vm_agent);
        assert_eq!(config.extensions_time_budget, "PT1H30M");
        assert_eq!(config.max_bid_price, -1.0);
        assert_eq!(config.priority, Priority::Regular);
    }
}

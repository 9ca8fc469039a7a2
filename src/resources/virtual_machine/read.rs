//! Machine reads and state projection.

use std::collections::HashMap;

use tracing::debug;

use crate::api::models::{EvictionPolicy, Priority, VirtualMachine};
use crate::azure::VirtualMachineId;
use crate::error::{Error, Result};

use super::connection::{self, parse_username_from_authorized_keys_path, ConnectionInfo};
use super::{AdminSshKey, VirtualMachineResource};

/// Observed state of a virtual machine, flattened for callers that
/// diff it against a desired configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualMachineState {
    pub id: String,
    pub name: String,
    pub resource_group: String,
    pub location: Option<String>,
    pub size: Option<String>,
    pub admin_username: Option<String>,
    pub admin_ssh_keys: Vec<AdminSshKey>,
    pub disable_password_authentication: Option<bool>,
    pub provision_vm_agent: Option<bool>,
    pub allow_extension_operations: Option<bool>,
    pub extensions_time_budget: Option<String>,
    pub network_interface_ids: Vec<String>,
    pub os_disk_name: Option<String>,
    pub os_disk_size_gb: Option<u32>,
    pub os_disk_caching: Option<String>,
    pub os_disk_storage_account_type: Option<String>,
    pub disk_encryption_set_id: Option<String>,
    pub ephemeral_os_disk: bool,
    pub source_image_id: Option<String>,
    pub priority: Priority,
    pub eviction_policy: Option<EvictionPolicy>,
    pub max_bid_price: Option<f64>,
    pub dedicated_host_id: Option<String>,
    pub availability_set_id: Option<String>,
    pub proximity_placement_group_id: Option<String>,
    pub virtual_machine_scale_set_id: Option<String>,
    pub zone: Option<String>,
    pub identity_type: Option<String>,
    pub identity_ids: Vec<String>,
    pub ultra_ssd_enabled: bool,
    pub encryption_at_host_enabled: bool,
    pub boot_diagnostics_storage_uri: Option<String>,
    pub provisioning_state: Option<String>,
    pub tags: HashMap<String, String>,
    pub connection: ConnectionInfo,
}

impl VirtualMachineResource {
    /// Reads the machine behind an opaque state ID. Returns `Ok(None)`
    /// when the control plane no longer knows the machine, so callers
    /// can drop it from their view of the world.
    pub async fn read(&self, id: &str) -> Result<Option<VirtualMachineState>> {
        let id = VirtualMachineId::parse(id)?;
        match self
            .virtual_machines
            .get(&id.resource_group, &id.name)
            .await
        {
            Ok(machine) => Ok(Some(self.project_state(&id, machine).await)),
            Err(err) if err.is_not_found() => {
                debug!(name = %id.name, "virtual machine no longer exists");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read for callers that just mutated the machine and expect it to
    /// exist.
    pub(crate) async fn read_required(&self, id: &VirtualMachineId) -> Result<VirtualMachineState> {
        self.read(&id.to_string())
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn project_state(
        &self,
        id: &VirtualMachineId,
        machine: VirtualMachine,
    ) -> VirtualMachineState {
        let properties = machine.properties.unwrap_or_default();

        let connection = connection::resolve(
            self.network_interfaces.as_ref(),
            self.public_ips.as_ref(),
            &properties,
        )
        .await;

        let mut state = VirtualMachineState {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group: id.resource_group.clone(),
            location: machine.location,
            priority: properties.priority.unwrap_or_default(),
            eviction_policy: properties.eviction_policy,
            extensions_time_budget: properties.extensions_time_budget,
            provisioning_state: properties.provisioning_state,
            zone: machine
                .zones
                .as_ref()
                .and_then(|zones| zones.first().cloned()),
            tags: machine.tags.unwrap_or_default(),
            connection,
            ..Default::default()
        };

        if let Some(identity) = machine.identity {
            state.identity_type = identity.identity_type;
            state.identity_ids = identity
                .user_assigned_identities
                .map(|ids| ids.into_keys().collect())
                .unwrap_or_default();
        }

        if let Some(hardware) = properties.hardware_profile {
            state.size = hardware.vm_size;
        }

        if let Some(billing) = properties.billing_profile {
            state.max_bid_price = billing.max_price;
        }

        if let Some(security) = properties.security_profile {
            state.encryption_at_host_enabled = security.encryption_at_host.unwrap_or(false);
        }

        if let Some(capabilities) = properties.additional_capabilities {
            state.ultra_ssd_enabled = capabilities.ultra_ssd_enabled.unwrap_or(false);
        }

        state.availability_set_id = properties.availability_set.and_then(|set| set.id);
        state.dedicated_host_id = properties.host.and_then(|host| host.id);
        state.proximity_placement_group_id = properties
            .proximity_placement_group
            .and_then(|group| group.id);
        state.virtual_machine_scale_set_id = properties
            .virtual_machine_scale_set
            .and_then(|scale_set| scale_set.id);

        if let Some(profile) = properties.network_profile {
            state.network_interface_ids = profile
                .network_interfaces
                .unwrap_or_default()
                .into_iter()
                .filter_map(|reference| reference.id)
                .collect();
        }

        if let Some(diagnostics) = properties
            .diagnostics_profile
            .and_then(|profile| profile.boot_diagnostics)
        {
            if diagnostics.enabled.unwrap_or(false) {
                state.boot_diagnostics_storage_uri = diagnostics.storage_uri;
            }
        }

        if let Some(storage) = properties.storage_profile {
            if let Some(reference) = storage.image_reference {
                state.source_image_id = reference.id;
            }
            if let Some(disk) = storage.os_disk {
                state.ephemeral_os_disk = disk.is_ephemeral();
                state.os_disk_name = disk.name;
                state.os_disk_size_gb = disk.disk_size_gb;
                state.os_disk_caching = disk.caching;
                if let Some(managed) = disk.managed_disk {
                    state.os_disk_storage_account_type = managed.storage_account_type;
                    state.disk_encryption_set_id =
                        managed.disk_encryption_set.and_then(|set| set.id);
                }
            }
        }

        if let Some(os_profile) = properties.os_profile {
            state.admin_username = os_profile.admin_username;
            state.allow_extension_operations = os_profile.allow_extension_operations;
            if let Some(linux) = os_profile.linux_configuration {
                state.disable_password_authentication = linux.disable_password_authentication;
                state.provision_vm_agent = linux.provision_vm_agent;
                for key in linux
                    .ssh
                    .and_then(|ssh| ssh.public_keys)
                    .unwrap_or_default()
                {
                    match parse_username_from_authorized_keys_path(&key.path) {
                        Some(username) => state.admin_ssh_keys.push(AdminSshKey {
                            username,
                            public_key: key.key_data,
                        }),
                        None => {
                            debug!(path = %key.path, "skipping SSH key with unrecognized path");
                        }
                    }
                }
            }
        }

        state
    }
}

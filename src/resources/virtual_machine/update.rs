//! The update orchestrator.
//!
//! Most machine properties can be patched in place, but some need the
//! machine powered off first and a few need the compute reservation
//! released entirely. The orchestrator accumulates the strongest
//! requirement across the change set, downgrades it against the live
//! power state (a machine that is already deallocated needs neither
//! shutdown nor deallocation), then applies the steps in order:
//! power off, deallocate, disk patches, machine patch, restart.

use tracing::{debug, info, warn};

use crate::api::models::{
    AdditionalCapabilities, BillingProfile, BootDiagnostics, DiagnosticsProfile, DiskEncryption,
    DiskUpdate, DiskUpdateProperties, HardwareProfile, NetworkInterfaceReference, NetworkProfile,
    Priority, SecurityProfile, StorageProfile, SubResource, VirtualMachineUpdate,
    ENCRYPTION_AT_REST_WITH_CUSTOMER_KEY,
};
use crate::api::wait_for_completion;
use crate::azure::{DedicatedHostId, NetworkInterfaceId, VirtualMachineId};
use crate::error::{Error, Result};

use super::create::{expand_identity, expand_os_disk, expand_secrets};
use super::{
    should_be_started, PowerState, VirtualMachineConfig, VirtualMachineResource,
    VirtualMachineState,
};

/// Which parts of the configuration differ from the last known state.
///
/// Derived from a prior/desired pair, or constructed directly by
/// callers that track dirtiness themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualMachineChanges {
    pub boot_diagnostics: bool,
    pub secrets: bool,
    pub identity: bool,
    pub dedicated_host_id: bool,
    pub extensions_time_budget: bool,
    pub max_bid_price: bool,
    pub network_interface_ids: bool,
    /// Any OS disk setting. Size and encryption-set changes also raise
    /// their dedicated flags below.
    pub os_disk: bool,
    pub os_disk_size_gb: bool,
    pub os_disk_encryption_set_id: bool,
    pub size: bool,
    pub allow_extension_operations: bool,
    pub ultra_ssd_enabled: bool,
    pub encryption_at_host_enabled: bool,
    pub tags: bool,
}

impl VirtualMachineChanges {
    pub fn between(prior: &VirtualMachineConfig, desired: &VirtualMachineConfig) -> Self {
        Self {
            boot_diagnostics: prior.boot_diagnostics != desired.boot_diagnostics,
            secrets: prior.secrets != desired.secrets,
            identity: prior.identity != desired.identity,
            dedicated_host_id: prior.dedicated_host_id != desired.dedicated_host_id,
            extensions_time_budget: prior.extensions_time_budget != desired.extensions_time_budget,
            max_bid_price: prior.max_bid_price != desired.max_bid_price,
            network_interface_ids: prior.network_interface_ids != desired.network_interface_ids,
            os_disk: prior.os_disk != desired.os_disk,
            os_disk_size_gb: prior.os_disk.disk_size_gb != desired.os_disk.disk_size_gb,
            os_disk_encryption_set_id: prior.os_disk.disk_encryption_set_id
                != desired.os_disk.disk_encryption_set_id,
            size: prior.size != desired.size,
            allow_extension_operations: prior.allow_extension_operations
                != desired.allow_extension_operations,
            ultra_ssd_enabled: prior.ultra_ssd_enabled() != desired.ultra_ssd_enabled(),
            encryption_at_host_enabled: prior.encryption_at_host_enabled
                != desired.encryption_at_host_enabled,
            tags: prior.tags != desired.tags,
        }
    }
}

impl VirtualMachineResource {
    /// Diffs `prior` against `desired` and applies whatever the change
    /// set requires.
    pub async fn update(
        &self,
        prior: &VirtualMachineConfig,
        desired: &VirtualMachineConfig,
    ) -> Result<VirtualMachineState> {
        let changes = VirtualMachineChanges::between(prior, desired);
        self.apply_update(desired, changes).await
    }

    /// Applies an explicit change set against the live machine.
    pub async fn apply_update(
        &self,
        desired: &VirtualMachineConfig,
        changes: VirtualMachineChanges,
    ) -> Result<VirtualMachineState> {
        if changes.max_bid_price && desired.priority != Priority::Spot {
            return Err(Error::validation(
                "max_bid_price",
                "`max_bid_price` can only be configured when `priority` is set to `Spot`",
            ));
        }

        let id =
            VirtualMachineId::new(&self.subscription_id, &desired.resource_group, &desired.name);
        let _guard = self.locks.lock(&id.name).await;

        let existing = self
            .virtual_machines
            .get(&id.resource_group, &id.name)
            .await?;
        let instance_view = self
            .virtual_machines
            .instance_view(&id.resource_group, &id.name)
            .await?;

        // a running machine gets started again after any stop this
        // update causes
        let should_turn_back_on = should_be_started(&instance_view);
        let has_ephemeral_os_disk = existing
            .properties
            .as_ref()
            .and_then(|properties| properties.storage_profile.as_ref())
            .and_then(|storage| storage.os_disk.as_ref())
            .map(|disk| disk.is_ephemeral())
            .unwrap_or(false);

        let mut should_update = false;
        let mut should_shut_down = false;
        let mut should_deallocate = false;
        let mut update = VirtualMachineUpdate::default();

        if changes.boot_diagnostics {
            should_update = true;
            update.properties.diagnostics_profile = Some(DiagnosticsProfile {
                boot_diagnostics: Some(match &desired.boot_diagnostics {
                    Some(diagnostics) => BootDiagnostics {
                        enabled: Some(true),
                        storage_uri: diagnostics.storage_account_uri.clone(),
                    },
                    None => BootDiagnostics {
                        enabled: Some(false),
                        storage_uri: None,
                    },
                }),
            });
        }

        if changes.secrets {
            should_update = true;
            update
                .properties
                .os_profile
                .get_or_insert_with(Default::default)
                .secrets = Some(expand_secrets(desired));
        }

        if changes.allow_extension_operations {
            should_update = true;
            update
                .properties
                .os_profile
                .get_or_insert_with(Default::default)
                .allow_extension_operations = Some(desired.allow_extension_operations);
        }

        if changes.identity {
            should_update = true;
            update.identity = desired.identity.as_ref().map(expand_identity);
        }

        if changes.dedicated_host_id {
            should_update = true;
            should_deallocate = true;
            // an empty reference detaches the machine from its host
            update.host = Some(match &desired.dedicated_host_id {
                Some(raw) => {
                    DedicatedHostId::parse(raw)?;
                    SubResource::with_id(raw)
                }
                None => SubResource::default(),
            });
        }

        if changes.extensions_time_budget {
            should_update = true;
            update.properties.extensions_time_budget =
                Some(desired.extensions_time_budget.clone());
        }

        if changes.max_bid_price {
            // the bid only applies from the next allocation onwards
            should_update = true;
            should_shut_down = true;
            should_deallocate = true;
            update.properties.billing_profile = Some(BillingProfile {
                max_price: Some(desired.max_bid_price),
            });
        }

        if changes.network_interface_ids {
            should_update = true;
            should_shut_down = true;
            should_deallocate = true;
            for raw in &desired.network_interface_ids {
                NetworkInterfaceId::parse(raw)?;
            }
            update.properties.network_profile = Some(NetworkProfile {
                network_interfaces: Some(
                    desired
                        .network_interface_ids
                        .iter()
                        .map(|nic_id| NetworkInterfaceReference {
                            id: Some(nic_id.clone()),
                            primary: None,
                        })
                        .collect(),
                ),
            });
        }

        if changes.os_disk {
            should_update = true;
            should_shut_down = true;
            should_deallocate = true;
            update.properties.storage_profile = Some(StorageProfile {
                image_reference: None,
                os_disk: Some(expand_os_disk(desired)),
                data_disks: None,
            });
        }

        if changes.size {
            should_update = true;
            should_shut_down = true;

            // resizing within the current hardware cluster does not
            // require releasing the reservation
            let available = self
                .virtual_machines
                .list_available_sizes(&id.resource_group, &id.name)
                .await?;
            let available_on_cluster = available.iter().any(|size| {
                size.name
                    .as_deref()
                    .map(|name| name.eq_ignore_ascii_case(&desired.size))
                    .unwrap_or(false)
            });
            if !available_on_cluster {
                should_deallocate = true;
            }

            update.properties.hardware_profile = Some(HardwareProfile {
                vm_size: Some(desired.size.clone()),
            });
        }

        if changes.ultra_ssd_enabled {
            should_update = true;
            should_shut_down = true;
            should_deallocate = true;
            update.properties.additional_capabilities = Some(AdditionalCapabilities {
                ultra_ssd_enabled: Some(desired.ultra_ssd_enabled()),
            });
        }

        if changes.encryption_at_host_enabled {
            should_update = true;
            should_deallocate = true;
            update.properties.security_profile = Some(SecurityProfile {
                encryption_at_host: Some(desired.encryption_at_host_enabled),
            });
        }

        if changes.tags {
            should_update = true;
            update.tags = Some(desired.tags.clone());
        }

        // the live power state may have already satisfied part of what
        // the change set asks for
        for status in instance_view.statuses.iter().flatten() {
            let Some(code) = status.code.as_deref() else {
                continue;
            };
            match PowerState::from_status_code(code) {
                Some(PowerState::Deallocated) => {
                    should_shut_down = false;
                    should_deallocate = false;
                }
                Some(PowerState::Deallocating) | Some(PowerState::Stopped) => {
                    should_shut_down = false;
                }
                _ => {}
            }
        }

        let wait = self.wait_options(self.timeouts.update);

        if should_shut_down {
            info!(name = %id.name, "powering off virtual machine");
            let operation = self
                .virtual_machines
                .power_off(&id.resource_group, &id.name, false)
                .await?;
            wait_for_completion(operation, "power off", &id.name, wait).await?;
        }

        if should_deallocate {
            if has_ephemeral_os_disk {
                // ephemeral disks live on the host and do not survive
                // deallocation
                warn!(name = %id.name, "skipping deallocation for machine with an ephemeral OS disk");
            } else {
                info!(name = %id.name, "deallocating virtual machine");
                let operation = self
                    .virtual_machines
                    .deallocate(&id.resource_group, &id.name)
                    .await?;
                wait_for_completion(operation, "deallocate", &id.name, wait).await?;
            }
        }

        if changes.os_disk_size_gb {
            match desired.os_disk.disk_size_gb {
                Some(new_size) => {
                    let disk_name = existing_os_disk_name(&existing)?;
                    info!(name = %id.name, disk = %disk_name, size_gb = new_size, "resizing OS disk");
                    let operation = self
                        .disks
                        .update(
                            &id.resource_group,
                            &disk_name,
                            DiskUpdate {
                                properties: DiskUpdateProperties {
                                    disk_size_gb: Some(new_size),
                                    encryption: None,
                                },
                            },
                        )
                        .await?;
                    wait_for_completion(operation, "resize OS disk", &disk_name, wait).await?;
                }
                None => {
                    debug!(name = %id.name, "OS disk size unset; leaving the disk as provisioned");
                }
            }
        }

        if changes.os_disk_encryption_set_id {
            match &desired.os_disk.disk_encryption_set_id {
                Some(encryption_set_id) => {
                    let disk_name = existing_os_disk_name(&existing)?;
                    info!(name = %id.name, disk = %disk_name, "changing OS disk encryption set");
                    let operation = self
                        .disks
                        .update(
                            &id.resource_group,
                            &disk_name,
                            DiskUpdate {
                                properties: DiskUpdateProperties {
                                    disk_size_gb: None,
                                    encryption: Some(DiskEncryption {
                                        encryption_type: Some(
                                            ENCRYPTION_AT_REST_WITH_CUSTOMER_KEY.to_string(),
                                        ),
                                        disk_encryption_set_id: Some(encryption_set_id.clone()),
                                    }),
                                },
                            },
                        )
                        .await?;
                    wait_for_completion(operation, "update OS disk encryption", &disk_name, wait)
                        .await?;
                }
                None => {
                    // a disk encrypted with a customer-managed key
                    // cannot return to a platform-managed key
                    return Err(Error::validation(
                        "os_disk.disk_encryption_set_id",
                        "removing a disk encryption set is not supported once one is in use",
                    ));
                }
            }
        }

        if should_update {
            info!(name = %id.name, "updating virtual machine");
            let operation = self
                .virtual_machines
                .update(&id.resource_group, &id.name, update)
                .await?;
            wait_for_completion(operation, "update", &id.name, wait).await?;
        }

        if should_turn_back_on && should_shut_down {
            info!(name = %id.name, "starting virtual machine");
            let operation = self
                .virtual_machines
                .start(&id.resource_group, &id.name)
                .await?;
            wait_for_completion(operation, "start", &id.name, wait).await?;
        }

        self.read_required(&id).await
    }
}

fn existing_os_disk_name(existing: &crate::api::models::VirtualMachine) -> Result<String> {
    existing
        .properties
        .as_ref()
        .and_then(|properties| properties.storage_profile.as_ref())
        .and_then(|storage| storage.os_disk.as_ref())
        .and_then(|disk| disk.name.clone())
        .ok_or_else(|| Error::Internal("existing machine reports no OS disk name".to_string()))
}

//! Machine creation.

use std::collections::HashMap;

use tracing::info;

use crate::api::models::{
    AdditionalCapabilities, BillingProfile, BootDiagnostics, DiagnosticsProfile, DiffDiskOption,
    DiffDiskSettings, HardwareProfile, ImageReference, LinuxConfiguration, ManagedDiskParameters,
    NetworkInterfaceReference, NetworkProfile, OsDisk, OsProfile, Priority, SecurityProfile,
    SshConfiguration, SshPublicKey, StorageProfile, SubResource, VaultCertificate,
    VaultSecretGroup, VirtualMachine, VirtualMachineIdentity, VirtualMachineProperties,
};
use crate::api::wait_for_completion;
use crate::azure::{DedicatedHostId, NetworkInterfaceId, VirtualMachineId};
use crate::error::{Error, Result};

use super::{IdentityConfig, VirtualMachineConfig, VirtualMachineResource, VirtualMachineState};

impl VirtualMachineResource {
    /// Creates the machine described by `config` and returns its state
    /// once provisioning completes.
    ///
    /// Fails without touching the network when the configuration is
    /// internally inconsistent, and with [`Error::AlreadyExists`] when a
    /// machine of the same name is already present.
    pub async fn create(&self, config: &VirtualMachineConfig) -> Result<VirtualMachineState> {
        config.validate()?;

        let _guard = self.locks.lock(&config.name).await;

        let id = VirtualMachineId::new(&self.subscription_id, &config.resource_group, &config.name);
        match self
            .virtual_machines
            .get(&config.resource_group, &config.name)
            .await
        {
            Ok(_) => return Err(Error::AlreadyExists(id.to_string())),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        info!(name = %config.name, resource_group = %config.resource_group, "creating virtual machine");
        let params = build_virtual_machine(config)?;
        let operation = self
            .virtual_machines
            .create_or_update(&config.resource_group, &config.name, params)
            .await?;
        wait_for_completion(
            operation,
            "create",
            &config.name,
            self.wait_options(self.timeouts.create),
        )
        .await?;

        self.read_required(&id).await
    }
}

/// Assembles the full PUT payload from the desired configuration.
pub(super) fn build_virtual_machine(config: &VirtualMachineConfig) -> Result<VirtualMachine> {
    let image_reference = match (&config.source_image_id, &config.source_image_reference) {
        (Some(id), None) => ImageReference {
            id: Some(id.clone()),
            ..Default::default()
        },
        (None, Some(reference)) => ImageReference {
            publisher: Some(reference.publisher.clone()),
            offer: Some(reference.offer.clone()),
            sku: Some(reference.sku.clone()),
            version: Some(reference.version.clone()),
            id: None,
        },
        // validate() enforces exactly one image source
        _ => {
            return Err(Error::validation(
                "source_image_id",
                "exactly one image source must be set",
            ));
        }
    };

    for raw in &config.network_interface_ids {
        NetworkInterfaceId::parse(raw)?;
    }
    let network_interfaces = config
        .network_interface_ids
        .iter()
        .map(|id| NetworkInterfaceReference {
            id: Some(id.clone()),
            primary: None,
        })
        .collect();

    let host = match &config.dedicated_host_id {
        Some(raw) => {
            DedicatedHostId::parse(raw)?;
            Some(SubResource::with_id(raw))
        }
        None => None,
    };

    let billing_profile = (config.priority == Priority::Spot).then(|| BillingProfile {
        max_price: Some(config.max_bid_price),
    });

    let security_profile = config.encryption_at_host_enabled.then(|| SecurityProfile {
        encryption_at_host: Some(true),
    });

    let additional_capabilities =
        config
            .additional_capabilities
            .as_ref()
            .map(|capabilities| AdditionalCapabilities {
                ultra_ssd_enabled: Some(capabilities.ultra_ssd_enabled),
            });

    Ok(VirtualMachine {
        id: None,
        name: Some(config.name.clone()),
        location: Some(config.location.clone()),
        identity: config.identity.as_ref().map(expand_identity),
        plan: None,
        zones: config.zone.clone().map(|zone| vec![zone]),
        properties: Some(VirtualMachineProperties {
            hardware_profile: Some(HardwareProfile {
                vm_size: Some(config.size.clone()),
            }),
            storage_profile: Some(StorageProfile {
                image_reference: Some(image_reference),
                os_disk: Some(expand_os_disk(config)),
                data_disks: None,
            }),
            os_profile: Some(expand_os_profile(config)),
            network_profile: Some(NetworkProfile {
                network_interfaces: Some(network_interfaces),
            }),
            diagnostics_profile: config.boot_diagnostics.as_ref().map(|diagnostics| {
                DiagnosticsProfile {
                    boot_diagnostics: Some(BootDiagnostics {
                        enabled: Some(true),
                        storage_uri: diagnostics.storage_account_uri.clone(),
                    }),
                }
            }),
            billing_profile,
            security_profile,
            additional_capabilities,
            availability_set: config
                .availability_set_id
                .as_deref()
                .map(SubResource::with_id),
            host,
            proximity_placement_group: config
                .proximity_placement_group_id
                .as_deref()
                .map(SubResource::with_id),
            virtual_machine_scale_set: config
                .virtual_machine_scale_set_id
                .as_deref()
                .map(SubResource::with_id),
            priority: Some(config.priority),
            eviction_policy: config.eviction_policy,
            extensions_time_budget: Some(config.extensions_time_budget.clone()),
            provisioning_state: None,
        }),
        tags: Some(config.tags.clone()),
    })
}

pub(super) fn expand_os_disk(config: &VirtualMachineConfig) -> OsDisk {
    let disk = &config.os_disk;
    OsDisk {
        name: disk.name.clone(),
        caching: Some(disk.caching.clone()),
        create_option: Some("FromImage".to_string()),
        disk_size_gb: disk.disk_size_gb,
        managed_disk: Some(ManagedDiskParameters {
            id: None,
            storage_account_type: Some(disk.storage_account_type.clone()),
            disk_encryption_set: disk
                .disk_encryption_set_id
                .as_deref()
                .map(SubResource::with_id),
        }),
        diff_disk_settings: disk.ephemeral.then(|| DiffDiskSettings {
            option: DiffDiskOption::Local,
        }),
        write_accelerator_enabled: Some(disk.write_accelerator_enabled),
    }
}

pub(super) fn expand_os_profile(config: &VirtualMachineConfig) -> OsProfile {
    let ssh = (!config.admin_ssh_keys.is_empty()).then(|| SshConfiguration {
        public_keys: Some(
            config
                .admin_ssh_keys
                .iter()
                .map(|key| SshPublicKey {
                    path: key.authorized_keys_path(),
                    key_data: key.public_key.clone(),
                })
                .collect(),
        ),
    });

    OsProfile {
        computer_name: Some(config.computer_name().to_string()),
        admin_username: Some(config.admin_username.clone()),
        admin_password: config.admin_password.clone(),
        custom_data: config.custom_data.clone(),
        linux_configuration: Some(LinuxConfiguration {
            disable_password_authentication: Some(config.disable_password_authentication),
            provision_vm_agent: Some(config.provision_vm_agent),
            ssh,
        }),
        secrets: Some(expand_secrets(config)),
        allow_extension_operations: Some(config.allow_extension_operations),
    }
}

pub(super) fn expand_secrets(config: &VirtualMachineConfig) -> Vec<VaultSecretGroup> {
    config
        .secrets
        .iter()
        .map(|secret| VaultSecretGroup {
            source_vault: SubResource::with_id(&secret.key_vault_id),
            vault_certificates: secret
                .certificate_urls
                .iter()
                .map(|url| VaultCertificate {
                    certificate_url: url.clone(),
                })
                .collect(),
        })
        .collect()
}

pub(super) fn expand_identity(identity: &IdentityConfig) -> VirtualMachineIdentity {
    let user_assigned_identities = (!identity.identity_ids.is_empty()).then(|| {
        identity
            .identity_ids
            .iter()
            .map(|id| (id.clone(), serde_json::json!({})))
            .collect::<HashMap<_, _>>()
    });

    VirtualMachineIdentity {
        identity_type: Some(identity.identity_type.clone()),
        principal_id: None,
        tenant_id: None,
        user_assigned_identities,
    }
}

//! In-memory recording fakes for the control-plane traits.
//!
//! One `FakeCloud` holds a single machine plus the surrounding network
//! objects and records every call it receives, so tests can assert on
//! the exact call sequence an operation produced.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;

use azcompute::api::models::{
    DiskUpdate, HardwareProfile, InstanceViewStatus, ManagedDiskParameters,
    NetworkInterface, NetworkInterfaceReference, NetworkProfile, OsDisk, PublicIpAddress,
    StorageProfile, VirtualMachine, VirtualMachineExtension, VirtualMachineInstanceView,
    VirtualMachineProperties, VirtualMachineSize, VirtualMachineUpdate,
};
use azcompute::api::{
    ApiError, ApiResult, CompletedOperation, DisksApi, LongRunningOperation,
    NetworkInterfacesApi, OperationStatus, PublicIpAddressesApi, VirtualMachineExtensionsApi,
    VirtualMachinesApi,
};
use azcompute::locks::LockRegistry;
use azcompute::resources::virtual_machine::{
    AdminSshKey, OsDiskConfig, SourceImageReference, VirtualMachineConfig, VirtualMachineResource,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const SUB: &str = "00000000-0000-0000-0000-000000000000";
pub const GROUP: &str = "group1";

pub fn machine_id(name: &str) -> String {
    format!(
        "/subscriptions/{SUB}/resourceGroups/{GROUP}/providers/Microsoft.Compute/virtualMachines/{name}"
    )
}

pub fn nic_id(name: &str) -> String {
    format!(
        "/subscriptions/{SUB}/resourceGroups/{GROUP}/providers/Microsoft.Network/networkInterfaces/{name}"
    )
}

pub fn public_ip_id(name: &str) -> String {
    format!(
        "/subscriptions/{SUB}/resourceGroups/{GROUP}/providers/Microsoft.Network/publicIPAddresses/{name}"
    )
}

pub fn disk_id(name: &str) -> String {
    format!("/subscriptions/{SUB}/resourceGroups/{GROUP}/providers/Microsoft.Compute/disks/{name}")
}

/// A server-side machine with an OS disk and one attached interface.
pub fn provisioned_machine(name: &str) -> VirtualMachine {
    VirtualMachine {
        id: Some(machine_id(name)),
        name: Some(name.to_string()),
        location: Some("westeurope".to_string()),
        properties: Some(VirtualMachineProperties {
            hardware_profile: Some(HardwareProfile {
                vm_size: Some("Standard_F2".to_string()),
            }),
            storage_profile: Some(StorageProfile {
                os_disk: Some(OsDisk {
                    name: Some("osdisk1".to_string()),
                    caching: Some("ReadWrite".to_string()),
                    create_option: Some("FromImage".to_string()),
                    disk_size_gb: Some(30),
                    managed_disk: Some(ManagedDiskParameters {
                        id: Some(disk_id("osdisk1")),
                        storage_account_type: Some("Premium_LRS".to_string()),
                        disk_encryption_set: None,
                    }),
                    diff_disk_settings: None,
                    write_accelerator_enabled: Some(false),
                }),
                ..Default::default()
            }),
            network_profile: Some(NetworkProfile {
                network_interfaces: Some(vec![NetworkInterfaceReference {
                    id: Some(nic_id("nic1")),
                    primary: None,
                }]),
            }),
            provisioning_state: Some("Succeeded".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// An operation that reaches a failed terminal state.
struct FailedOperation {
    message: String,
}

#[async_trait]
impl LongRunningOperation for FailedOperation {
    async fn status(&self) -> ApiResult<OperationStatus> {
        Ok(OperationStatus::Failed(self.message.clone()))
    }
}

#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<String>>,
    pub machine: Mutex<Option<VirtualMachine>>,
    deleted: Mutex<bool>,
    /// Name of an operation whose handle should report failure.
    failing_operation: Mutex<Option<String>>,
    /// Reads that still see the machine after its delete completed.
    pub stale_reads_after_delete: AtomicU32,
    pub power_state_codes: Mutex<Vec<String>>,
    pub available_sizes: Mutex<Vec<String>>,
    pub network_interfaces: Mutex<HashMap<String, NetworkInterface>>,
    pub public_ips: Mutex<HashMap<String, PublicIpAddress>>,
    pub extension: Mutex<Option<VirtualMachineExtension>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }

    pub fn with_machine(machine: VirtualMachine) -> Arc<Self> {
        init_tracing();
        let cloud = Self::default();
        *cloud.machine.lock().unwrap() = Some(machine);
        *cloud.power_state_codes.lock().unwrap() = vec!["PowerState/running".to_string()];
        Arc::new(cloud)
    }

    pub fn set_power_state(&self, code: &str) {
        *self.power_state_codes.lock().unwrap() = vec![code.to_string()];
    }

    /// Makes the named operation return a handle that reports failure.
    pub fn fail_operation(&self, name: &str) {
        *self.failing_operation.lock().unwrap() = Some(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn finish(&self, name: &str) -> ApiResult<Box<dyn LongRunningOperation>> {
        if self.failing_operation.lock().unwrap().as_deref() == Some(name) {
            return Ok(Box::new(FailedOperation {
                message: format!("{name} failed on the control plane"),
            }));
        }
        Ok(Box::new(CompletedOperation))
    }
}

#[async_trait]
impl VirtualMachinesApi for FakeCloud {
    async fn get(&self, _resource_group: &str, name: &str) -> ApiResult<VirtualMachine> {
        self.record("get");
        let machine = self.machine.lock().unwrap().clone();
        let deleted = *self.deleted.lock().unwrap();
        match machine {
            Some(machine) if !deleted => Ok(machine),
            Some(machine) if self.stale_reads_after_delete.load(Ordering::SeqCst) > 0 => {
                self.stale_reads_after_delete.fetch_sub(1, Ordering::SeqCst);
                Ok(machine)
            }
            _ => Err(ApiError::not_found(name)),
        }
    }

    async fn instance_view(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ApiResult<VirtualMachineInstanceView> {
        self.record("instance_view");
        let statuses = self
            .power_state_codes
            .lock()
            .unwrap()
            .iter()
            .map(|code| InstanceViewStatus {
                code: Some(code.clone()),
                ..Default::default()
            })
            .collect();
        Ok(VirtualMachineInstanceView {
            statuses: Some(statuses),
        })
    }

    async fn list_available_sizes(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ApiResult<Vec<VirtualMachineSize>> {
        self.record("list_available_sizes");
        Ok(self
            .available_sizes
            .lock()
            .unwrap()
            .iter()
            .map(|name| VirtualMachineSize {
                name: Some(name.clone()),
                ..Default::default()
            })
            .collect())
    }

    async fn create_or_update(
        &self,
        _resource_group: &str,
        name: &str,
        params: VirtualMachine,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("create_or_update");
        let mut stored = params;
        stored.id = Some(machine_id(name));
        *self.machine.lock().unwrap() = Some(stored);
        *self.deleted.lock().unwrap() = false;
        self.finish("create_or_update")
    }

    async fn update(
        &self,
        _resource_group: &str,
        _name: &str,
        _params: VirtualMachineUpdate,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("update");
        self.finish("update")
    }

    async fn delete(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("delete");
        *self.deleted.lock().unwrap() = true;
        self.finish("delete")
    }

    async fn power_off(
        &self,
        _resource_group: &str,
        _name: &str,
        skip_shutdown: bool,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record(format!("power_off(skip_shutdown={skip_shutdown})"));
        self.finish("power_off")
    }

    async fn deallocate(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("deallocate");
        self.finish("deallocate")
    }

    async fn start(
        &self,
        _resource_group: &str,
        _name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("start");
        self.finish("start")
    }
}

#[async_trait]
impl DisksApi for FakeCloud {
    async fn update(
        &self,
        _resource_group: &str,
        disk_name: &str,
        _params: DiskUpdate,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record(format!("disks.update({disk_name})"));
        self.finish("disks.update")
    }

    async fn delete(
        &self,
        _resource_group: &str,
        disk_name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record(format!("disks.delete({disk_name})"));
        self.finish("disks.delete")
    }
}

#[async_trait]
impl NetworkInterfacesApi for FakeCloud {
    async fn get(&self, _resource_group: &str, name: &str) -> ApiResult<NetworkInterface> {
        self.record(format!("network_interfaces.get({name})"));
        self.network_interfaces
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::not_found(name))
    }
}

#[async_trait]
impl PublicIpAddressesApi for FakeCloud {
    async fn get(&self, _resource_group: &str, name: &str) -> ApiResult<PublicIpAddress> {
        self.record(format!("public_ips.get({name})"));
        self.public_ips
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::not_found(name))
    }
}

#[async_trait]
impl VirtualMachineExtensionsApi for FakeCloud {
    async fn get(
        &self,
        _resource_group: &str,
        _virtual_machine_name: &str,
        name: &str,
    ) -> ApiResult<VirtualMachineExtension> {
        self.record("extensions.get");
        self.extension
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::not_found(name))
    }

    async fn create_or_update(
        &self,
        _resource_group: &str,
        virtual_machine_name: &str,
        name: &str,
        params: VirtualMachineExtension,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("extensions.create_or_update");
        let mut stored = params;
        stored.id = Some(format!(
            "{}/extensions/{name}",
            machine_id(virtual_machine_name)
        ));
        stored.properties.get_or_insert_with(Default::default).provisioning_state =
            Some("Succeeded".to_string());
        *self.extension.lock().unwrap() = Some(stored);
        self.finish("extensions.create_or_update")
    }

    async fn delete(
        &self,
        _resource_group: &str,
        _virtual_machine_name: &str,
        _name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>> {
        self.record("extensions.delete");
        *self.extension.lock().unwrap() = None;
        self.finish("extensions.delete")
    }
}

/// A desired configuration that matches [`provisioned_machine`], so a
/// diff against it starts from "no changes".
pub fn machine_config(name: &str) -> VirtualMachineConfig {
    VirtualMachineConfig {
        name: name.to_string(),
        resource_group: GROUP.to_string(),
        location: "westeurope".to_string(),
        size: "Standard_F2".to_string(),
        admin_username: "adminuser".to_string(),
        admin_password: None,
        disable_password_authentication: true,
        admin_ssh_keys: vec![AdminSshKey {
            username: "adminuser".to_string(),
            public_key: "ssh-rsa AAAAB3...".to_string(),
        }],
        network_interface_ids: vec![nic_id("nic1")],
        os_disk: OsDiskConfig {
            caching: "ReadWrite".to_string(),
            storage_account_type: "Premium_LRS".to_string(),
            name: Some("osdisk1".to_string()),
            disk_size_gb: Some(30),
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
        priority: Default::default(),
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

/// A resource adapter wired to the fake with fast polling.
pub fn virtual_machine_resource(cloud: &Arc<FakeCloud>) -> VirtualMachineResource {
    VirtualMachineResource::new(
        Arc::clone(cloud) as Arc<dyn VirtualMachinesApi>,
        Arc::clone(cloud) as Arc<dyn DisksApi>,
        Arc::clone(cloud) as Arc<dyn NetworkInterfacesApi>,
        Arc::clone(cloud) as Arc<dyn PublicIpAddressesApi>,
        Arc::new(LockRegistry::new()),
        SUB,
    )
    .with_poll_interval(Duration::from_millis(1))
    .with_delete_poll_interval(Duration::from_millis(1))
}

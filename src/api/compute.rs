//! Client traits for the Microsoft.Compute control-plane surface.
//!
//! Transports implement these; the resource adapters only ever see the
//! traits. Mutating calls hand back a [`LongRunningOperation`] which the
//! caller awaits through [`crate::api::wait_for_completion`]. A 404
//! response surfaces as [`ApiError::NotFound`](crate::api::ApiError) so
//! callers can distinguish "vanished" from "failed".

use async_trait::async_trait;

use crate::api::lro::LongRunningOperation;
use crate::api::models::{
    DiskUpdate, GalleryImageVersion, VirtualMachine, VirtualMachineExtension,
    VirtualMachineInstanceView, VirtualMachineSize, VirtualMachineUpdate,
};
use crate::api::ApiResult;

/// Operations on virtual machines.
#[async_trait]
pub trait VirtualMachinesApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<VirtualMachine>;

    /// Fetches the live runtime status (power state and friends).
    async fn instance_view(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<VirtualMachineInstanceView>;

    /// Lists the sizes the VM can resize to on its current hardware
    /// cluster without moving hosts.
    async fn list_available_sizes(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<Vec<VirtualMachineSize>>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: VirtualMachine,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    async fn update(
        &self,
        resource_group: &str,
        name: &str,
        params: VirtualMachineUpdate,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    /// Stops the VM. With `skip_shutdown` the guest OS is not asked to
    /// shut down cleanly first.
    async fn power_off(
        &self,
        resource_group: &str,
        name: &str,
        skip_shutdown: bool,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    /// Releases the compute/host reservation (distinct from power-off).
    async fn deallocate(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    async fn start(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;
}

/// Operations on managed disks. Disk resize and encryption-set changes
/// are disk-resource operations and cannot go through the VM API.
#[async_trait]
pub trait DisksApi: Send + Sync {
    async fn update(
        &self,
        resource_group: &str,
        disk_name: &str,
        params: DiskUpdate,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    async fn delete(
        &self,
        resource_group: &str,
        disk_name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;
}

/// Operations on virtual machine extensions.
#[async_trait]
pub trait VirtualMachineExtensionsApi: Send + Sync {
    async fn get(
        &self,
        resource_group: &str,
        virtual_machine_name: &str,
        name: &str,
    ) -> ApiResult<VirtualMachineExtension>;

    async fn create_or_update(
        &self,
        resource_group: &str,
        virtual_machine_name: &str,
        name: &str,
        params: VirtualMachineExtension,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;

    async fn delete(
        &self,
        resource_group: &str,
        virtual_machine_name: &str,
        name: &str,
    ) -> ApiResult<Box<dyn LongRunningOperation>>;
}

/// Read access to shared image gallery versions.
#[async_trait]
pub trait GalleryImageVersionsApi: Send + Sync {
    /// Lists versions of an image in API-returned order. The ordering
    /// contract of the underlying API is unspecified; callers must not
    /// assume more than "stable within one response".
    async fn list(
        &self,
        resource_group: &str,
        gallery_name: &str,
        image_name: &str,
    ) -> ApiResult<Vec<GalleryImageVersion>>;

    async fn get(
        &self,
        resource_group: &str,
        gallery_name: &str,
        image_name: &str,
        version: &str,
    ) -> ApiResult<GalleryImageVersion>;
}

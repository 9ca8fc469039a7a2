//! Azure Resource Manager identifier model.
//!
//! ARM path-style identifiers are the primary keys of everything this
//! crate manages. [`resource_id`] holds the generic ordered-segment
//! parser; [`ids`] the typed projections for each resource kind.

pub mod ids;
pub mod resource_id;

pub use ids::{
    AvailabilitySetId, DedicatedHostGroupId, DedicatedHostId, ManagedDiskId, NetworkInterfaceId,
    PublicIpAddressId, SharedImageGalleryId, SharedImageId, SharedImageVersionId,
    VirtualMachineExtensionId, VirtualMachineId,
};
pub use resource_id::{validate_resource_id, ResourceId};

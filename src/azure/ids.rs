//! Typed identifiers for the Azure Compute surface.
//!
//! Each identifier kind is a projection over a [`ResourceId`], built by
//! popping its named segments in a fixed order. Popping a missing or
//! wrongly-cased segment aborts the parse, and any leftover segments
//! after extraction fail validation - a `virtualMachines` path is never
//! silently accepted as a disk, and vice versa.

use std::fmt;

use crate::azure::resource_id::ResourceId;
use crate::error::Result;

macro_rules! id_validator {
    ($fn_name:ident, $ty:ident) => {
        /// Validates a raw value through the config-validation channel.
        pub fn $fn_name(value: &str, field_name: &str) -> (Vec<String>, Vec<String>) {
            let mut errors = Vec::new();
            if let Err(err) = $ty::parse(value) {
                errors.push(format!("`{field_name}`: {err}"));
            }
            (Vec::new(), errors)
        }
    };
}

/// Identifier of a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl VirtualMachineId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let name = id.pop_segment("virtualMachines")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            name,
        })
    }
}

impl fmt::Display for VirtualMachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

id_validator!(validate_virtual_machine_id, VirtualMachineId);

/// Identifier of an extension attached to a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineExtensionId {
    pub subscription_id: String,
    pub resource_group: String,
    pub virtual_machine_name: String,
    pub name: String,
}

impl VirtualMachineExtensionId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        virtual_machine_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            virtual_machine_name: virtual_machine_name.into(),
            name: name.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let virtual_machine_name = id.pop_segment("virtualMachines")?;
        let name = id.pop_segment("extensions")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            virtual_machine_name,
            name,
        })
    }
}

impl fmt::Display for VirtualMachineExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}/extensions/{}",
            self.subscription_id, self.resource_group, self.virtual_machine_name, self.name
        )
    }
}

id_validator!(validate_virtual_machine_extension_id, VirtualMachineExtensionId);

/// Identifier of a managed disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDiskId {
    pub subscription_id: String,
    pub resource_group: String,
    pub disk_name: String,
}

impl ManagedDiskId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let disk_name = id.pop_segment("disks")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            disk_name,
        })
    }
}

impl fmt::Display for ManagedDiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/disks/{}",
            self.subscription_id, self.resource_group, self.disk_name
        )
    }
}

id_validator!(validate_managed_disk_id, ManagedDiskId);

/// Identifier of a dedicated host group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedicatedHostGroupId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl DedicatedHostGroupId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let name = id.pop_segment("hostGroups")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            name,
        })
    }
}

impl fmt::Display for DedicatedHostGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/hostGroups/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

id_validator!(validate_dedicated_host_group_id, DedicatedHostGroupId);

/// Identifier of a dedicated host within a host group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedicatedHostId {
    pub subscription_id: String,
    pub resource_group: String,
    pub host_group: String,
    pub name: String,
}

impl DedicatedHostId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let host_group = id.pop_segment("hostGroups")?;
        let name = id.pop_segment("hosts")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            host_group,
            name,
        })
    }
}

impl fmt::Display for DedicatedHostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/hostGroups/{}/hosts/{}",
            self.subscription_id, self.resource_group, self.host_group, self.name
        )
    }
}

id_validator!(validate_dedicated_host_id, DedicatedHostId);

/// Identifier of a shared image gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedImageGalleryId {
    pub subscription_id: String,
    pub resource_group: String,
    pub gallery_name: String,
}

impl SharedImageGalleryId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let gallery_name = id.pop_segment("galleries")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            gallery_name,
        })
    }
}

impl fmt::Display for SharedImageGalleryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/galleries/{}",
            self.subscription_id, self.resource_group, self.gallery_name
        )
    }
}

/// Identifier of an image definition within a shared image gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedImageId {
    pub subscription_id: String,
    pub resource_group: String,
    pub gallery_name: String,
    pub image_name: String,
}

impl SharedImageId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let gallery_name = id.pop_segment("galleries")?;
        let image_name = id.pop_segment("images")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            gallery_name,
            image_name,
        })
    }
}

impl fmt::Display for SharedImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/galleries/{}/images/{}",
            self.subscription_id, self.resource_group, self.gallery_name, self.image_name
        )
    }
}

/// Identifier of a version of a shared image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedImageVersionId {
    pub subscription_id: String,
    pub resource_group: String,
    pub gallery_name: String,
    pub image_name: String,
    pub version: String,
}

impl SharedImageVersionId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let gallery_name = id.pop_segment("galleries")?;
        let image_name = id.pop_segment("images")?;
        let version = id.pop_segment("versions")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            gallery_name,
            image_name,
            version,
        })
    }
}

impl fmt::Display for SharedImageVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/galleries/{}/images/{}/versions/{}",
            self.subscription_id,
            self.resource_group,
            self.gallery_name,
            self.image_name,
            self.version
        )
    }
}

id_validator!(validate_shared_image_version_id, SharedImageVersionId);

/// Identifier of a network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl NetworkInterfaceId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let name = id.pop_segment("networkInterfaces")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            name,
        })
    }
}

impl fmt::Display for NetworkInterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/networkInterfaces/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

id_validator!(validate_network_interface_id, NetworkInterfaceId);

/// Identifier of a public IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpAddressId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl PublicIpAddressId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let name = id.pop_segment("publicIPAddresses")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            name,
        })
    }
}

impl fmt::Display for PublicIpAddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

/// Identifier of an availability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySetId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl AvailabilitySetId {
    pub fn parse(input: &str) -> Result<Self> {
        let mut id = ResourceId::parse(input)?;
        let name = id.pop_segment("availabilitySets")?;
        id.validate_no_empty_segments()?;
        Ok(Self {
            subscription_id: id.subscription_id,
            resource_group: id.resource_group,
            name,
        })
    }
}

impl fmt::Display for AvailabilitySetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/availabilitySets/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

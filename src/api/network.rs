//! Client traits for the Microsoft.Network surface consumed by the
//! connection-info resolver.

use async_trait::async_trait;

use crate::api::models::{NetworkInterface, PublicIpAddress};
use crate::api::ApiResult;

/// Read access to network interfaces.
#[async_trait]
pub trait NetworkInterfacesApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<NetworkInterface>;
}

/// Read access to public IP addresses.
#[async_trait]
pub trait PublicIpAddressesApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> ApiResult<PublicIpAddress>;
}

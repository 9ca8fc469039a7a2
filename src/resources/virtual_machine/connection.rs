//! Connection-info resolution.
//!
//! A machine's addresses live on its network interfaces, not on the
//! machine itself. The resolver walks the attached interfaces in the
//! order the control plane returns them; the first address that
//! resolves becomes the primary one. Interfaces that fail to resolve
//! are skipped, so a machine mid-reconfiguration still reads cleanly.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::api::models::VirtualMachineProperties;
use crate::api::{NetworkInterfacesApi, PublicIpAddressesApi};
use crate::azure::{NetworkInterfaceId, PublicIpAddressId};

static AUTHORIZED_KEYS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/home/(?P<username>[^/]+)/\.ssh/authorized_keys$")
        .expect("authorized_keys path pattern is valid")
});

/// Recovers the username from an authorized-keys path of the form
/// `/home/<username>/.ssh/authorized_keys`. Anything else, including
/// paths with extra or missing segments, yields `None`.
pub fn parse_username_from_authorized_keys_path(path: &str) -> Option<String> {
    AUTHORIZED_KEYS_PATH
        .captures(path)
        .and_then(|captures| captures.name("username"))
        .map(|username| username.as_str().to_string())
}

/// Private and public addresses of a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub primary_private_address: Option<String>,
    pub private_addresses: Vec<String>,
    pub primary_public_address: Option<String>,
    pub public_addresses: Vec<String>,
}

/// Resolves connection info from the machine's network profile.
///
/// Resolution is best-effort: an interface or public IP that cannot be
/// fetched is logged and skipped rather than failing the read.
pub(crate) async fn resolve(
    network_interfaces: &dyn NetworkInterfacesApi,
    public_ips: &dyn PublicIpAddressesApi,
    properties: &VirtualMachineProperties,
) -> ConnectionInfo {
    let mut info = ConnectionInfo::default();

    let references = properties
        .network_profile
        .as_ref()
        .and_then(|profile| profile.network_interfaces.as_deref())
        .unwrap_or_default();

    for reference in references {
        let Some(raw_id) = reference.id.as_deref() else {
            continue;
        };
        let interface_id = match NetworkInterfaceId::parse(raw_id) {
            Ok(id) => id,
            Err(err) => {
                debug!(id = raw_id, error = %err, "skipping unparseable network interface reference");
                continue;
            }
        };
        let interface = match network_interfaces
            .get(&interface_id.resource_group, &interface_id.name)
            .await
        {
            Ok(interface) => interface,
            Err(err) => {
                debug!(interface = %interface_id.name, error = %err, "skipping unresolvable network interface");
                continue;
            }
        };

        let configurations = interface
            .properties
            .as_ref()
            .and_then(|properties| properties.ip_configurations.as_deref())
            .unwrap_or_default();

        for configuration in configurations {
            let Some(properties) = &configuration.properties else {
                continue;
            };

            if let Some(private) = &properties.private_ip_address {
                if info.primary_private_address.is_none() {
                    info.primary_private_address = Some(private.clone());
                }
                info.private_addresses.push(private.clone());
            }

            let Some(raw_public_id) = properties
                .public_ip_address
                .as_ref()
                .and_then(|reference| reference.id.as_deref())
            else {
                continue;
            };
            let public_id = match PublicIpAddressId::parse(raw_public_id) {
                Ok(id) => id,
                Err(err) => {
                    debug!(id = raw_public_id, error = %err, "skipping unparseable public IP reference");
                    continue;
                }
            };
            let public = match public_ips
                .get(&public_id.resource_group, &public_id.name)
                .await
            {
                Ok(public) => public,
                Err(err) => {
                    debug!(public_ip = %public_id.name, error = %err, "skipping unresolvable public IP");
                    continue;
                }
            };
            if let Some(address) = public
                .properties
                .as_ref()
                .and_then(|properties| properties.ip_address.as_ref())
            {
                if info.primary_public_address.is_none() {
                    info.primary_public_address = Some(address.clone());
                }
                info.public_addresses.push(address.clone());
            }
        }
    }

    info
}

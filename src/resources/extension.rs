//! Virtual machine extension resource adapter.
//!
//! Extensions are child resources of a machine, so every mutation
//! takes the parent machine's lock: installing an extension while the
//! machine is being reconfigured or deleted would race inside the
//! control plane.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::models::{VirtualMachineExtension, VirtualMachineExtensionProperties};
use crate::api::{wait_for_completion, VirtualMachineExtensionsApi, VirtualMachinesApi, WaitOptions};
use crate::azure::{VirtualMachineExtensionId, VirtualMachineId};
use crate::error::{Error, Result};
use crate::locks::LockRegistry;
use crate::resources::OperationTimeouts;

fn default_true() -> bool {
    true
}

/// Desired configuration of an extension on a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub name: String,
    pub virtual_machine_id: String,
    pub publisher: String,
    #[serde(rename = "type")]
    pub extension_type: String,
    pub type_handler_version: String,
    #[serde(default = "default_true")]
    pub auto_upgrade_minor_version: bool,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
    /// Settings the control plane never echoes back (credentials and
    /// the like).
    #[serde(default)]
    pub protected_settings: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ExtensionConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(settings) = &self.settings {
            if !settings.is_object() {
                return Err(Error::validation("settings", "must be a JSON object"));
            }
        }
        if let Some(protected) = &self.protected_settings {
            if !protected.is_object() {
                return Err(Error::validation(
                    "protected_settings",
                    "must be a JSON object",
                ));
            }
        }
        Ok(())
    }
}

/// Observed state of an extension. `protected_settings` is write-only
/// and deliberately absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionState {
    pub id: String,
    pub name: String,
    pub virtual_machine_id: String,
    pub publisher: Option<String>,
    pub extension_type: Option<String>,
    pub type_handler_version: Option<String>,
    pub auto_upgrade_minor_version: bool,
    pub settings: Option<serde_json::Value>,
    pub provisioning_state: Option<String>,
    pub tags: HashMap<String, String>,
}

/// The extension resource adapter.
pub struct VirtualMachineExtensionResource {
    extensions: Arc<dyn VirtualMachineExtensionsApi>,
    virtual_machines: Arc<dyn VirtualMachinesApi>,
    locks: Arc<LockRegistry>,
    timeouts: OperationTimeouts,
    poll_interval: Duration,
}

impl VirtualMachineExtensionResource {
    pub fn new(
        extensions: Arc<dyn VirtualMachineExtensionsApi>,
        virtual_machines: Arc<dyn VirtualMachinesApi>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            extensions,
            virtual_machines,
            locks,
            timeouts: OperationTimeouts::default(),
            poll_interval: Duration::from_secs(10),
        }
    }

    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn wait_options(&self, timeout: Duration) -> WaitOptions {
        WaitOptions {
            timeout,
            poll_interval: self.poll_interval,
        }
    }

    /// Installs the extension. Fails with [`Error::AlreadyExists`] when
    /// an extension of the same name is already attached.
    pub async fn create(&self, config: &ExtensionConfig) -> Result<ExtensionState> {
        config.validate()?;
        let vm_id = VirtualMachineId::parse(&config.virtual_machine_id)?;
        let id = VirtualMachineExtensionId::new(
            &vm_id.subscription_id,
            &vm_id.resource_group,
            &vm_id.name,
            &config.name,
        );

        let _guard = self.locks.lock(&vm_id.name).await;

        match self
            .extensions
            .get(&vm_id.resource_group, &vm_id.name, &config.name)
            .await
        {
            Ok(_) => return Err(Error::AlreadyExists(id.to_string())),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        self.apply(&id, &vm_id, config, self.timeouts.create).await
    }

    /// Re-applies the extension configuration in place.
    pub async fn update(&self, config: &ExtensionConfig) -> Result<ExtensionState> {
        config.validate()?;
        let vm_id = VirtualMachineId::parse(&config.virtual_machine_id)?;
        let id = VirtualMachineExtensionId::new(
            &vm_id.subscription_id,
            &vm_id.resource_group,
            &vm_id.name,
            &config.name,
        );

        let _guard = self.locks.lock(&vm_id.name).await;
        self.apply(&id, &vm_id, config, self.timeouts.update).await
    }

    async fn apply(
        &self,
        id: &VirtualMachineExtensionId,
        vm_id: &VirtualMachineId,
        config: &ExtensionConfig,
        timeout: Duration,
    ) -> Result<ExtensionState> {
        // the extension inherits the parent machine's location
        let machine = self
            .virtual_machines
            .get(&vm_id.resource_group, &vm_id.name)
            .await?;
        let location = machine
            .location
            .ok_or_else(|| Error::Internal(format!("machine '{vm_id}' reports no location")))?;

        let params = VirtualMachineExtension {
            id: None,
            name: Some(config.name.clone()),
            location: Some(location),
            properties: Some(VirtualMachineExtensionProperties {
                publisher: Some(config.publisher.clone()),
                extension_type: Some(config.extension_type.clone()),
                type_handler_version: Some(config.type_handler_version.clone()),
                auto_upgrade_minor_version: Some(config.auto_upgrade_minor_version),
                settings: config.settings.clone(),
                protected_settings: config.protected_settings.clone(),
                provisioning_state: None,
            }),
            tags: Some(config.tags.clone()),
        };

        info!(extension = %config.name, machine = %vm_id.name, "applying virtual machine extension");
        let operation = self
            .extensions
            .create_or_update(&vm_id.resource_group, &vm_id.name, &config.name, params)
            .await?;
        wait_for_completion(
            operation,
            "apply extension",
            &config.name,
            self.wait_options(timeout),
        )
        .await?;

        self.read(&id.to_string())
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Reads the extension behind an opaque state ID; `Ok(None)` when it
    /// no longer exists.
    pub async fn read(&self, id: &str) -> Result<Option<ExtensionState>> {
        let id = VirtualMachineExtensionId::parse(id)?;
        let extension = match self
            .extensions
            .get(&id.resource_group, &id.virtual_machine_name, &id.name)
            .await
        {
            Ok(extension) => extension,
            Err(err) if err.is_not_found() => {
                debug!(extension = %id.name, "extension no longer exists");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let vm_id = VirtualMachineId::new(
            &id.subscription_id,
            &id.resource_group,
            &id.virtual_machine_name,
        );

        let mut state = ExtensionState {
            id: id.to_string(),
            name: id.name.clone(),
            virtual_machine_id: vm_id.to_string(),
            tags: extension.tags.unwrap_or_default(),
            ..Default::default()
        };
        if let Some(properties) = extension.properties {
            state.publisher = properties.publisher;
            state.extension_type = properties.extension_type;
            state.type_handler_version = properties.type_handler_version;
            state.auto_upgrade_minor_version =
                properties.auto_upgrade_minor_version.unwrap_or(false);
            state.settings = properties.settings;
            state.provisioning_state = properties.provisioning_state;
        }
        Ok(Some(state))
    }

    /// Removes the extension. Deleting an extension that is already gone
    /// succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = VirtualMachineExtensionId::parse(id)?;
        let _guard = self.locks.lock(&id.virtual_machine_name).await;

        info!(extension = %id.name, machine = %id.virtual_machine_name, "deleting virtual machine extension");
        let operation = match self
            .extensions
            .delete(&id.resource_group, &id.virtual_machine_name, &id.name)
            .await
        {
            Ok(operation) => operation,
            Err(err) if err.is_not_found() => {
                debug!(extension = %id.name, "extension already deleted");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        wait_for_completion(
            operation,
            "delete extension",
            &id.name,
            self.wait_options(self.timeouts.delete),
        )
        .await
    }
}

//! Machine deletion.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::wait_for_completion;
use crate::api::StatePoller;
use crate::azure::{ManagedDiskId, VirtualMachineId};
use crate::error::Result;

use super::VirtualMachineResource;

impl VirtualMachineResource {
    /// Deletes the machine behind an opaque state ID.
    ///
    /// The machine is powered off first so billing stops even if the
    /// delete itself takes a while, then deleted, then (feature-gated)
    /// its OS disk is deleted too. Success is only declared once the
    /// control plane has stopped reporting the machine for several
    /// consecutive observations; reads served by stale replicas can
    /// otherwise resurrect it.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = VirtualMachineId::parse(id)?;
        let _guard = self.locks.lock(&id.name).await;

        let existing = match self
            .virtual_machines
            .get(&id.resource_group, &id.name)
            .await
        {
            Ok(machine) => machine,
            Err(err) if err.is_not_found() => {
                debug!(name = %id.name, "virtual machine already deleted");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let wait = self.wait_options(self.timeouts.delete);

        let skip_shutdown = !self.features.graceful_shutdown;
        info!(name = %id.name, skip_shutdown, "powering off virtual machine before delete");
        let operation = self
            .virtual_machines
            .power_off(&id.resource_group, &id.name, skip_shutdown)
            .await?;
        wait_for_completion(operation, "power off", &id.name, wait).await?;

        info!(name = %id.name, "deleting virtual machine");
        let operation = self
            .virtual_machines
            .delete(&id.resource_group, &id.name)
            .await?;
        wait_for_completion(operation, "delete", &id.name, wait).await?;

        if self.features.delete_os_disk_on_deletion {
            self.delete_os_disk(&id, &existing).await?;
        }

        // the delete can report success while reads still return the
        // machine for a while
        match self
            .virtual_machines
            .get(&id.resource_group, &id.name)
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        debug!(name = %id.name, "virtual machine still reported after delete; polling until it disappears");
        let poller = StatePoller::new(["200"], ["404"])
            .min_interval(self.delete_poll_interval)
            .timeout(self.timeouts.delete)
            .continuous_target_occurrence(3);

        let virtual_machines = Arc::clone(&self.virtual_machines);
        let resource_group = id.resource_group.clone();
        let name = id.name.clone();
        poller
            .wait_for_state(move || {
                let virtual_machines = Arc::clone(&virtual_machines);
                let resource_group = resource_group.clone();
                let name = name.clone();
                async move {
                    match virtual_machines.get(&resource_group, &name).await {
                        Ok(_) => Ok(((), "200".to_string())),
                        Err(err) if err.is_not_found() => Ok(((), "404".to_string())),
                        Err(err) => Err(err.into()),
                    }
                }
            })
            .await?;

        Ok(())
    }

    async fn delete_os_disk(
        &self,
        id: &VirtualMachineId,
        existing: &crate::api::models::VirtualMachine,
    ) -> Result<()> {
        let disk_id = existing
            .properties
            .as_ref()
            .and_then(|properties| properties.storage_profile.as_ref())
            .and_then(|storage| storage.os_disk.as_ref())
            .and_then(|disk| disk.managed_disk.as_ref())
            .and_then(|managed| managed.id.as_deref());

        let Some(raw_disk_id) = disk_id else {
            debug!(name = %id.name, "machine reports no managed OS disk to delete");
            return Ok(());
        };
        let disk_id = ManagedDiskId::parse(raw_disk_id)?;

        info!(name = %id.name, disk = %disk_id.disk_name, "deleting OS disk");
        match self
            .disks
            .delete(&disk_id.resource_group, &disk_id.disk_name)
            .await
        {
            Ok(operation) => {
                wait_for_completion(
                    operation,
                    "delete OS disk",
                    &disk_id.disk_name,
                    self.wait_options(self.timeouts.delete),
                )
                .await
            }
            // already gone, possibly deleted alongside the machine
            Err(err) if err.is_not_found() => {
                debug!(disk = %disk_id.disk_name, "OS disk already deleted");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

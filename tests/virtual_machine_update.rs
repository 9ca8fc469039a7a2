//! Call-sequence tests for the update orchestrator.

mod support;

use pretty_assertions::assert_eq;

use azcompute::api::models::{DiffDiskOption, DiffDiskSettings};

use support::{machine_config, nic_id, provisioned_machine, virtual_machine_resource, FakeCloud, SUB};

#[tokio::test]
async fn tags_only_change_patches_in_place() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired
        .tags
        .insert("environment".to_string(), "production".to_string());

    resource.update(&prior, &desired).await.unwrap();

    assert_eq!(
        cloud.calls(),
        vec![
            "get",
            "instance_view",
            "update",
            // re-read after the mutation
            "get",
            "network_interfaces.get(nic1)",
        ]
    );
}

#[tokio::test]
async fn network_interface_change_stops_deallocates_and_restarts() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.network_interface_ids = vec![nic_id("nic2")];

    resource.update(&prior, &desired).await.unwrap();

    assert_eq!(
        cloud.calls(),
        vec![
            "get",
            "instance_view",
            "power_off(skip_shutdown=false)",
            "deallocate",
            "update",
            "start",
            "get",
            "network_interfaces.get(nic1)",
        ]
    );
}

#[tokio::test]
async fn deallocated_machine_needs_no_power_transitions() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    cloud.set_power_state("PowerState/deallocated");
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.network_interface_ids = vec![nic_id("nic2")];

    resource.update(&prior, &desired).await.unwrap();

    let calls = cloud.calls();
    assert!(!calls.iter().any(|c| c.starts_with("power_off")));
    assert!(!calls.contains(&"deallocate".to_string()));
    assert!(!calls.contains(&"start".to_string()));
    assert!(calls.contains(&"update".to_string()));
}

#[tokio::test]
async fn stopped_machine_skips_shutdown_but_still_deallocates() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    cloud.set_power_state("PowerState/stopped");
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.network_interface_ids = vec![nic_id("nic2")];

    resource.update(&prior, &desired).await.unwrap();

    let calls = cloud.calls();
    assert!(!calls.iter().any(|c| c.starts_with("power_off")));
    assert!(calls.contains(&"deallocate".to_string()));
    // the machine was not running, so it is not started afterwards
    assert!(!calls.contains(&"start".to_string()));
}

#[tokio::test]
async fn resize_within_cluster_avoids_deallocation() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    *cloud.available_sizes.lock().unwrap() = vec!["STANDARD_F4".to_string()];
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.size = "Standard_F4".to_string();

    resource.update(&prior, &desired).await.unwrap();

    assert_eq!(
        cloud.calls(),
        vec![
            "get",
            "instance_view",
            "list_available_sizes",
            "power_off(skip_shutdown=false)",
            "update",
            "start",
            "get",
            "network_interfaces.get(nic1)",
        ]
    );
}

#[tokio::test]
async fn resize_off_cluster_deallocates() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.size = "Standard_D8".to_string();

    resource.update(&prior, &desired).await.unwrap();

    let calls = cloud.calls();
    assert!(calls.contains(&"list_available_sizes".to_string()));
    assert!(calls.contains(&"deallocate".to_string()));
}

#[tokio::test]
async fn ephemeral_os_disk_is_never_deallocated() {
    let mut machine = provisioned_machine("machine1");
    machine
        .properties
        .as_mut()
        .unwrap()
        .storage_profile
        .as_mut()
        .unwrap()
        .os_disk
        .as_mut()
        .unwrap()
        .diff_disk_settings = Some(DiffDiskSettings {
        option: DiffDiskOption::Local,
    });
    let cloud = FakeCloud::with_machine(machine);
    let resource = virtual_machine_resource(&cloud);

    let mut prior = machine_config("machine1");
    prior.os_disk.ephemeral = true;
    let mut desired = prior.clone();
    desired.network_interface_ids = vec![nic_id("nic2")];

    resource.update(&prior, &desired).await.unwrap();

    let calls = cloud.calls();
    assert!(calls.iter().any(|c| c.starts_with("power_off")));
    assert!(!calls.contains(&"deallocate".to_string()));
    assert!(calls.contains(&"update".to_string()));
}

#[tokio::test]
async fn max_bid_price_on_regular_machine_fails_before_any_call() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.max_bid_price = 0.5;

    let err = resource.update(&prior, &desired).await.unwrap_err();
    assert!(err.to_string().contains("max_bid_price"));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn disk_resize_goes_through_the_disks_api() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.os_disk.disk_size_gb = Some(64);

    resource.update(&prior, &desired).await.unwrap();

    assert_eq!(
        cloud.calls(),
        vec![
            "get",
            "instance_view",
            "power_off(skip_shutdown=false)",
            "deallocate",
            "disks.update(osdisk1)",
            "update",
            "start",
            "get",
            "network_interfaces.get(nic1)",
        ]
    );
}

#[tokio::test]
async fn removing_disk_encryption_set_is_rejected() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let mut prior = machine_config("machine1");
    prior.os_disk.disk_encryption_set_id = Some(format!(
        "/subscriptions/{SUB}/resourceGroups/group1/providers/Microsoft.Compute/diskEncryptionSets/des1"
    ));
    let mut desired = machine_config("machine1");
    desired.os_disk.disk_encryption_set_id = None;

    let err = resource.update(&prior, &desired).await.unwrap_err();
    assert!(err.to_string().contains("disk_encryption_set_id"));
    // the failure aborts before the machine patch
    assert!(!cloud.calls().contains(&"update".to_string()));
}

#[tokio::test]
async fn failed_power_off_aborts_the_remaining_steps() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    cloud.fail_operation("power_off");
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.network_interface_ids = vec![nic_id("nic2")];

    let err = resource.update(&prior, &desired).await.unwrap_err();
    assert!(err.to_string().contains("power off"));

    // deallocate, the machine patch and the restart are never issued
    assert_eq!(
        cloud.calls(),
        vec![
            "get",
            "instance_view",
            "power_off(skip_shutdown=false)",
        ]
    );
}

#[tokio::test]
async fn failed_deallocate_aborts_before_the_machine_patch() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    cloud.fail_operation("deallocate");
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.network_interface_ids = vec![nic_id("nic2")];

    let err = resource.update(&prior, &desired).await.unwrap_err();
    assert!(err.to_string().contains("deallocate"));

    let calls = cloud.calls();
    assert!(calls.contains(&"deallocate".to_string()));
    assert!(!calls.contains(&"update".to_string()));
    assert!(!calls.contains(&"start".to_string()));
}

#[tokio::test]
async fn dedicated_host_change_deallocates_without_shutdown() {
    let cloud = FakeCloud::with_machine(provisioned_machine("machine1"));
    let resource = virtual_machine_resource(&cloud);

    let prior = machine_config("machine1");
    let mut desired = machine_config("machine1");
    desired.dedicated_host_id = Some(format!(
        "/subscriptions/{SUB}/resourceGroups/group1/providers/Microsoft.Compute/hostGroups/hg1/hosts/host1"
    ));

    resource.update(&prior, &desired).await.unwrap();

    let calls = cloud.calls();
    assert!(!calls.iter().any(|c| c.starts_with("power_off")));
    assert!(calls.contains(&"deallocate".to_string()));
    assert!(calls.contains(&"update".to_string()));
    assert!(!calls.contains(&"start".to_string()));
}

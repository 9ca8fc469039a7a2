//! # azcompute
//!
//! Declarative lifecycle management for Azure Compute resources:
//! Linux virtual machines, their extensions, and shared image gallery
//! lookups.
//!
//! The crate is organized in three layers:
//!
//! - [`azure`] parses and formats typed ARM resource identifiers. IDs
//!   are the lingua franca of the control plane and the crate's opaque
//!   state keys, so parsing is strict: fixed segments are matched
//!   case-sensitively and leftover segments are rejected.
//! - [`api`] is the control-plane boundary: wire models, async client
//!   traits a transport implements, and the long-running-operation
//!   plumbing every mutating call goes through.
//! - [`resources`] and [`datasources`] implement the lifecycle logic on
//!   top: create with pre-network validation, a power-state-aware
//!   update orchestrator, delete with eventual-consistency
//!   confirmation, and image version selection.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use azcompute::locks::LockRegistry;
//! use azcompute::resources::virtual_machine::VirtualMachineResource;
//!
//! # async fn demo(
//! #     virtual_machines: Arc<dyn azcompute::api::VirtualMachinesApi>,
//! #     disks: Arc<dyn azcompute::api::DisksApi>,
//! #     network_interfaces: Arc<dyn azcompute::api::NetworkInterfacesApi>,
//! #     public_ips: Arc<dyn azcompute::api::PublicIpAddressesApi>,
//! #     config: azcompute::resources::virtual_machine::VirtualMachineConfig,
//! # ) -> azcompute::Result<()> {
//! let resource = VirtualMachineResource::new(
//!     virtual_machines,
//!     disks,
//!     network_interfaces,
//!     public_ips,
//!     Arc::new(LockRegistry::new()),
//!     "00000000-0000-0000-0000-000000000000",
//! );
//!
//! let state = resource.create(&config).await?;
//! println!("created {}", state.id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod azure;
pub mod datasources;
pub mod error;
pub mod locks;
pub mod resources;

pub use error::{Error, Result};

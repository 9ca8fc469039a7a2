//! The control-plane boundary.
//!
//! Azure Resource Manager is an opaque collaborator: this module holds
//! the wire models for the slice of the compute/network surface the
//! crate consumes, the async client traits a transport must implement,
//! and the long-running-operation plumbing (`submit, then block with
//! timeout until terminal`) that every mutating call goes through.

pub mod compute;
pub mod lro;
pub mod models;
pub mod network;
pub mod poll;

use thiserror::Error;

pub use compute::{
    DisksApi, GalleryImageVersionsApi, VirtualMachineExtensionsApi, VirtualMachinesApi,
};
pub use lro::{wait_for_completion, CompletedOperation, LongRunningOperation, OperationStatus, WaitOptions};
pub use network::{NetworkInterfacesApi, PublicIpAddressesApi};
pub use poll::StatePoller;

/// Errors surfaced by the control-plane boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The control plane responded 404 for the target resource.
    #[error("resource '{resource}' was not found")]
    NotFound {
        /// Human-readable description of the missing resource
        resource: String,
    },

    /// The control plane rejected the request.
    #[error("control plane returned {code}: {message}")]
    Operation {
        /// ARM error code, e.g. `OperationNotAllowed`
        code: String,
        /// ARM error message
        message: String,
    },

    /// The request never reached a usable response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Creates a not-found error for the given resource description.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates an operation error with an ARM error code.
    pub fn operation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true for 404-style responses. Read paths treat these as
    /// "resource vanished" rather than failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Result type alias for control-plane calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

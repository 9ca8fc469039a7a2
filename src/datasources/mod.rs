//! Read-only lookups against the control plane.

pub mod shared_image_version;

pub use shared_image_version::SharedImageVersionsDataSource;

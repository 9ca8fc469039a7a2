//! Shared image gallery version lookup.
//!
//! Besides exact version names, callers can ask for `latest`: the most
//! recently published version that is not excluded from latest. Not
//! every version carries a published date, so selection stable-sorts by
//! date and falls back to the API-returned order for undated entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::models::GalleryImageVersion;
use crate::api::GalleryImageVersionsApi;
use crate::error::{Error, Result};

/// Version name that selects the newest eligible version.
pub const LATEST_VERSION: &str = "latest";

/// Lookup of shared image gallery versions.
pub struct SharedImageVersionsDataSource {
    gallery_versions: Arc<dyn GalleryImageVersionsApi>,
}

impl SharedImageVersionsDataSource {
    pub fn new(gallery_versions: Arc<dyn GalleryImageVersionsApi>) -> Self {
        Self { gallery_versions }
    }

    /// Finds a version of an image by exact name, or the newest eligible
    /// one when `version` is [`LATEST_VERSION`].
    pub async fn find(
        &self,
        resource_group: &str,
        gallery_name: &str,
        image_name: &str,
        version: &str,
    ) -> Result<GalleryImageVersion> {
        if version.eq_ignore_ascii_case(LATEST_VERSION) {
            let versions = self
                .gallery_versions
                .list(resource_group, gallery_name, image_name)
                .await?;
            debug!(
                image = image_name,
                candidates = versions.len(),
                "selecting latest image version"
            );
            return select_latest(versions).ok_or_else(|| {
                Error::NotFound(format!(
                    "no version of image '{image_name}' in gallery '{gallery_name}' is eligible for 'latest'"
                ))
            });
        }

        self.gallery_versions
            .get(resource_group, gallery_name, image_name, version)
            .await
            .map_err(Into::into)
    }
}

/// Orders versions oldest-first by published date.
///
/// The sort is stable and undated versions compare lowest, so they keep
/// their relative API-returned order ahead of the dated ones. The last
/// element is therefore the newest dated version or, when none carries
/// a date, the last the API returned.
pub fn sort_versions(mut versions: Vec<GalleryImageVersion>) -> Vec<GalleryImageVersion> {
    versions.sort_by_key(published_date);
    versions
}

/// Picks the newest version not excluded from latest.
pub fn select_latest(versions: Vec<GalleryImageVersion>) -> Option<GalleryImageVersion> {
    let eligible = versions
        .into_iter()
        .filter(|version| !excluded_from_latest(version))
        .collect();
    sort_versions(eligible).pop()
}

fn excluded_from_latest(version: &GalleryImageVersion) -> bool {
    version
        .properties
        .as_ref()
        .and_then(|properties| properties.publishing_profile.as_ref())
        .and_then(|profile| profile.exclude_from_latest)
        .unwrap_or(false)
}

fn published_date(version: &GalleryImageVersion) -> Option<DateTime<Utc>> {
    version
        .properties
        .as_ref()
        .and_then(|properties| properties.publishing_profile.as_ref())
        .and_then(|profile| profile.published_date)
}

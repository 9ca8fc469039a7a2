//! Generic parsing of Azure Resource Manager path-style identifiers.
//!
//! ARM identifies every resource by a path of the form:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{subtype}/{subname}]...
//! ```
//!
//! The fixed literals in that path (`subscriptions`, `resourceGroups`,
//! `providers` and the provider-specific type segments such as
//! `virtualMachines` or `extensions`) are case-sensitive contracts: ARM
//! rejects mismatched casing, so the parser does too. Typed identifiers
//! are built on top of [`ResourceId`] by popping named segments off the
//! parsed path in a fixed order - see [`crate::azure::ids`].

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// An ARM resource path decomposed into its ordered segments.
///
/// Constructed fresh from the opaque state string on every operation,
/// never mutated after typed extraction, and discarded once the call
/// completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// The subscription GUID (free-form, non-empty).
    pub subscription_id: String,
    /// The resource group name (free-form, non-empty).
    pub resource_group: String,
    /// The provider namespace, when a `providers` segment is present
    /// (e.g. `Microsoft.Compute`).
    pub provider: Option<String>,
    /// Remaining path segments in order of appearance.
    path: Vec<(String, String)>,
    /// Position in `path` where the `providers` pair appeared, so
    /// formatting preserves the original segment order.
    provider_index: usize,
    /// The raw input, kept for error reporting.
    raw: String,
}

impl ResourceId {
    /// Parses an ARM resource path.
    ///
    /// The first segment pair must be `subscriptions/{value}` and the
    /// second `resourceGroups/{value}`, with exact casing. Remaining
    /// segments are retained as an ordered key/value sequence for
    /// [`pop_segment`](Self::pop_segment).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::parse_id(raw, "ID cannot be empty"));
        }

        let trimmed = raw.trim_matches('/');
        let components: Vec<&str> = trimmed.split('/').collect();

        if components.iter().any(|c| c.is_empty()) {
            return Err(Error::parse_id(raw, "ID contained an empty segment"));
        }

        if components.len() % 2 != 0 {
            return Err(Error::parse_id(
                raw,
                "ID was missing a value for one of its segments",
            ));
        }

        let mut pairs = components.chunks_exact(2);

        let (sub_key, subscription_id) = match pairs.next() {
            Some([k, v]) => (*k, (*v).to_string()),
            _ => return Err(Error::parse_id(raw, "ID cannot be empty")),
        };
        if sub_key != "subscriptions" {
            return Err(Error::parse_id(
                raw,
                format!("expected the first segment to be `subscriptions`, got `{sub_key}`"),
            ));
        }

        let (rg_key, resource_group) = match pairs.next() {
            Some([k, v]) => (*k, (*v).to_string()),
            _ => {
                return Err(Error::parse_id(
                    raw,
                    "ID was missing the `resourceGroups` element",
                ))
            }
        };
        if rg_key != "resourceGroups" {
            return Err(Error::parse_id(
                raw,
                format!("expected the second segment to be `resourceGroups`, got `{rg_key}`"),
            ));
        }

        let mut provider = None;
        let mut provider_index = 0;
        let mut path = Vec::new();
        for pair in pairs {
            let (key, value) = (pair[0].to_string(), pair[1].to_string());
            // `providers` introduces a namespace rather than a typed segment
            if key == "providers" && provider.is_none() {
                provider = Some(value);
                provider_index = path.len();
                continue;
            }
            path.push((key, value));
        }

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path,
            provider_index,
            raw: raw.to_string(),
        })
    }

    /// Removes and returns the value for segment `name`.
    ///
    /// The match is exact-case: `Extensions` does not satisfy a pop of
    /// `extensions`. A missing or misnamed segment fails, which aborts
    /// the typed parse in progress.
    pub fn pop_segment(&mut self, name: &str) -> Result<String> {
        match self.path.iter().position(|(key, _)| key == name) {
            Some(idx) => {
                if idx < self.provider_index {
                    self.provider_index -= 1;
                }
                Ok(self.path.remove(idx).1)
            }
            None => Err(Error::parse_id(
                &self.raw,
                format!("ID was missing the `{name}` element"),
            )),
        }
    }

    /// Fails if any segments remain after typed extraction.
    ///
    /// A typed identifier must account for every segment of its input;
    /// trailing leftovers indicate the path belongs to a different
    /// resource kind.
    pub fn validate_no_empty_segments(&self) -> Result<()> {
        if self.path.is_empty() {
            return Ok(());
        }

        let leftover: Vec<String> = self
            .path
            .iter()
            .map(|(k, v)| format!("{k}/{v}"))
            .collect();
        Err(Error::parse_id(
            &self.raw,
            format!("ID contained unexpected segments: {}", leftover.join(", ")),
        ))
    }

    /// Remaining segments as a lookup map. Read-only convenience for
    /// callers that only need to inspect the path.
    pub fn path(&self) -> HashMap<&str, &str> {
        self.path
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        for (index, (key, value)) in self.path.iter().enumerate() {
            if index == self.provider_index {
                if let Some(provider) = &self.provider {
                    write!(f, "/providers/{provider}")?;
                }
            }
            write!(f, "/{key}/{value}")?;
        }
        if self.provider_index >= self.path.len() {
            if let Some(provider) = &self.provider {
                write!(f, "/providers/{provider}")?;
            }
        }
        Ok(())
    }
}

/// Validates a raw value as a parseable ARM resource ID, reporting
/// through the config-validation channel (warnings + errors) instead of
/// failing hard. This catches invalid static configuration before any
/// network call is attempted.
pub fn validate_resource_id(value: &str, field_name: &str) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    if let Err(err) = ResourceId::parse(value) {
        errors.push(format!("`{field_name}` is not a valid resource ID: {err}"));
    }
    (Vec::new(), errors)
}

//! Management API base URL resolution.
//!
//! Descope project identifiers of the current format embed a four character
//! region code at offset 1. The resolver turns that code into a regional API
//! host without any lookup table or network call:
//!
//! ```text
//! P1234567890123456789012345678901  ->  https://api.1234.descope.com
//! short-id                          ->  https://api.descope.com
//! ```
//!
//! An explicit, well-formed domain override always wins.

use serde::{Deserialize, Serialize};

/// Minimum identifier length (in characters) that carries a region code.
pub const REGIONAL_PROJECT_ID_LEN: usize = 32;

const REGION_OFFSET: usize = 1;
const REGION_LEN: usize = 4;

const SECURE_SCHEME: &str = "https://";

/// Host naming used when deriving the management API base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSettings {
    /// Scheme and leading host label, e.g. `https://api`.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// Trailing domain, e.g. `descope.com`.
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

fn default_url_prefix() -> String {
    "https://api".into()
}

fn default_domain_suffix() -> String {
    "descope.com".into()
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            url_prefix: default_url_prefix(),
            domain_suffix: default_domain_suffix(),
        }
    }
}

impl DomainSettings {
    /// The global (region-less) base URL.
    pub fn global_base_url(&self) -> String {
        format!("{}.{}", self.url_prefix, self.domain_suffix)
    }

    /// The base URL for a region code.
    pub fn regional_base_url(&self, region: &str) -> String {
        format!("{}.{}.{}", self.url_prefix, region, self.domain_suffix)
    }

    /// Resolve the management API base URL for a project.
    ///
    /// A well-formed `explicit_domain` is returned unchanged. Anything else
    /// falls back to the derived URL; callers that must reject a malformed
    /// override check [`is_well_formed_domain`] first.
    pub fn resolve_base_url(&self, project_id: &str, explicit_domain: Option<&str>) -> String {
        if let Some(domain) = explicit_domain
            && is_well_formed_domain(domain)
        {
            return domain.to_string();
        }

        match region_code(project_id) {
            Some(region) => self.regional_base_url(&region),
            None => self.global_base_url(),
        }
    }
}

/// Resolve with the default `https://api.*.descope.com` naming.
pub fn resolve_base_url(project_id: &str, explicit_domain: Option<&str>) -> String {
    DomainSettings::default().resolve_base_url(project_id, explicit_domain)
}

/// Extract the region code embedded in a project identifier.
///
/// Returns `None` for identifiers shorter than [`REGIONAL_PROJECT_ID_LEN`].
/// The code is not validated: a changed identifier format routes to a wrong
/// region rather than failing.
pub fn region_code(project_id: &str) -> Option<String> {
    if project_id.chars().count() < REGIONAL_PROJECT_ID_LEN {
        return None;
    }
    Some(
        project_id
            .chars()
            .skip(REGION_OFFSET)
            .take(REGION_LEN)
            .collect(),
    )
}

/// A domain override must use `https://` and must not end with `/`.
pub fn is_well_formed_domain(domain: &str) -> bool {
    domain.len() > SECURE_SCHEME.len() && domain.starts_with(SECURE_SCHEME) && !domain.ends_with('/')
}

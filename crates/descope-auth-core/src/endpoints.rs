//! Project identity and the endpoints derived from it.

use serde::{Deserialize, Serialize};

use crate::domain::{DomainSettings, is_well_formed_domain};
use crate::error::{ProvisioningError, Result};

/// The Descope project an adapter is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    project_id: String,
    explicit_domain: Option<String>,
}

impl ProjectIdentity {
    /// Creates a project identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the project id is empty or the domain
    /// override is not of the form `https://host` without a trailing `/`.
    pub fn new(project_id: impl Into<String>, explicit_domain: Option<String>) -> Result<Self> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(ProvisioningError::invalid_request(
                "project id must not be empty",
            ));
        }
        if let Some(domain) = &explicit_domain
            && !is_well_formed_domain(domain)
        {
            return Err(ProvisioningError::invalid_request(format!(
                "domain override '{domain}' must start with https:// and must not end with '/'"
            )));
        }
        Ok(Self {
            project_id,
            explicit_domain,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn explicit_domain(&self) -> Option<&str> {
        self.explicit_domain.as_deref()
    }
}

/// Endpoints published to the control plane.
///
/// Computed once; every URL shares the host of `management_base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEndpoints {
    pub management_base_url: String,
    pub jwt_issuer: String,
    pub token_endpoint: String,
    pub well_known_url: String,
    pub jwt_audience: Vec<String>,
}

impl ResolvedEndpoints {
    pub fn resolve(identity: &ProjectIdentity, settings: &DomainSettings) -> Self {
        let management_base_url =
            settings.resolve_base_url(identity.project_id(), identity.explicit_domain());
        let host = management_base_url
            .strip_prefix("https://")
            .unwrap_or(&management_base_url)
            .to_string();

        tracing::debug!(
            project_id = identity.project_id(),
            base_url = %management_base_url,
            "Resolved Descope management endpoints"
        );

        Self {
            jwt_issuer: format!("https://{host}/{}", identity.project_id()),
            token_endpoint: format!("https://{host}/oauth2/v1/token"),
            well_known_url: format!("https://{host}/.well-known/openid-configuration"),
            jwt_audience: vec![identity.project_id().to_string()],
            management_base_url,
        }
    }

    /// Host portion shared by all endpoints.
    pub fn host(&self) -> &str {
        self.management_base_url
            .strip_prefix("https://")
            .unwrap_or(&self.management_base_url)
    }
}

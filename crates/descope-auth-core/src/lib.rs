//! # descope-auth-core
//!
//! Pure building blocks of the Descope auth adapter:
//!
//! - [`domain`] - project id to management API base URL resolution
//! - [`endpoints`] - project identity and the endpoints published to the control plane
//! - [`secret`] - secret references and redacted secret values
//! - [`lifecycle`] - lifecycle event/response wire shapes
//! - [`request`] - typed managed-object requests and handler results
//! - [`error`] - the provisioning error taxonomy
//!
//! Nothing in this crate performs I/O.

pub mod domain;
pub mod endpoints;
pub mod error;
pub mod lifecycle;
pub mod request;
pub mod secret;

pub use domain::{DomainSettings, is_well_formed_domain, region_code, resolve_base_url};
pub use endpoints::{ProjectIdentity, ResolvedEndpoints};
pub use error::{ErrorKind, ProvisioningError, Result};
pub use lifecycle::{
    LifecycleEvent, LifecycleOperation, LifecycleResponse, ObjectKind, ResourceProperties,
    ResponseStatus,
};
pub use request::{
    ATTR_CLIENT_ID, ATTR_CLIENT_SECRET, ATTR_LOGIN_ID, ATTR_USER_ID, AdminUserSpec,
    MachineClientSpec, ManagedObject, ManagedObjectRequest, ManagedObjectResult,
};
pub use secret::{SecretRef, SecretValue};

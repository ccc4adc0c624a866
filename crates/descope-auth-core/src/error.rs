use thiserror::Error;

/// Failure classes for secret binding, request validation and upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The secret reference name is malformed.
    InvalidReference,
    /// The managed-object request is missing required fields.
    InvalidRequest,
    /// The caller holds no read grant for the secret.
    AccessDenied,
    /// The upstream object (or secret) does not exist.
    NotFound,
    /// Transport failure, timeout, authentication failure or 5xx from the management API.
    UpstreamUnavailable,
    /// The management API rejected the request (4xx).
    UpstreamRejected,
    /// The durable physical-id store or the secret vault could not be written.
    Storage,
}

impl ErrorKind {
    /// Wire name used in lifecycle failure reasons.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidReference => "InvalidReference",
            Self::InvalidRequest => "InvalidRequest",
            Self::AccessDenied => "AccessDenied",
            Self::NotFound => "NotFound",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::UpstreamRejected => "UpstreamRejected",
            Self::Storage => "Storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by the provisioning adapter.
///
/// Carries a [`ErrorKind`] plus a human-readable message that is surfaced
/// verbatim to the operator when provisioning halts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProvisioningError {
    pub kind: ErrorKind,
    pub message: String,
    /// Physical id of an upstream object created before the failure, so the
    /// host can roll it back.
    pub physical_id: Option<String>,
}

impl ProvisioningError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            physical_id: None,
        }
    }

    /// Attach the physical id of an object that already exists upstream.
    pub fn with_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.physical_id = Some(physical_id.into());
        self
    }

    /// Create a new InvalidReference error
    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidReference, message)
    }

    /// Create a new InvalidRequest error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Create a new AccessDenied error
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    /// Create a new NotFound error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a new UpstreamUnavailable error
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }

    /// Create a new UpstreamRejected error
    pub fn upstream_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamRejected, message)
    }

    /// Create a new Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Whether the host may redeliver the same lifecycle event.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::UpstreamUnavailable)
    }

    /// Whether the failure was raised before any outbound call could be made.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidReference | ErrorKind::InvalidRequest | ErrorKind::AccessDenied
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// Convenience result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisioningError>;

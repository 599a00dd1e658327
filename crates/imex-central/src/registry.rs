//! The registry ("Key Assigner") capability.
//!
//! Transport is opaque: anything that can reserve a range and
//! answer a lookup satisfies the trait, whether it speaks SOAP, REST or
//! reads a local file.

use imex_kernel::{ExternalRef, IdentifierRange, RegistryRecord};
use std::fmt;

/// Failures reported by a registry implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Network or I/O failure; the request may not have reached the registry.
    #[error("registry transport error: {0}")]
    Transport(String),

    #[error("registry rejected credentials: {0}")]
    Authentication(String),

    /// The registry understood the request and declined it.
    #[error("registry refused request: {0}")]
    Refused(String),
}

impl RegistryError {
    /// Authentication failures are final; everything else may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RegistryError::Authentication(_))
    }
}

/// Username/password pair presented to the registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated access to the central identifier registry.
pub trait KeyAssigner {
    /// Reserve a fresh range of at least `count` identifiers.
    fn request_range(&mut self, count: u64) -> Result<IdentifierRange, RegistryError>;

    /// What the registry knows about `external_ref`, if anything.
    fn lookup_publication(
        &mut self,
        external_ref: &ExternalRef,
    ) -> Result<Option<RegistryRecord>, RegistryError>;
}

impl<T: KeyAssigner + ?Sized> KeyAssigner for Box<T> {
    fn request_range(&mut self, count: u64) -> Result<IdentifierRange, RegistryError> {
        (**self).request_range(count)
    }

    fn lookup_publication(
        &mut self,
        external_ref: &ExternalRef,
    ) -> Result<Option<RegistryRecord>, RegistryError> {
        (**self).lookup_publication(external_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("curator", "s3cret"));
        assert!(rendered.contains("curator"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn only_authentication_failures_are_final() {
        assert!(RegistryError::Transport("timeout".into()).is_retryable());
        assert!(RegistryError::Refused("busy".into()).is_retryable());
        assert!(!RegistryError::Authentication("bad password".into()).is_retryable());
    }
}

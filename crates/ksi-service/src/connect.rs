//! Building collaborators from configured endpoints.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::traits::{AggregationService, ExtendingService, PublicationSource};

/// Login for the aggregation and extending services.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub login_id: String,
    pub login_key: String,
}

impl ServiceCredentials {
    pub fn new(login_id: impl Into<String>, login_key: impl Into<String>) -> Self {
        Self {
            login_id: login_id.into(),
            login_key: login_key.into(),
        }
    }
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("login_id", &self.login_id)
            .field("login_key", &"<redacted>")
            .finish()
    }
}

/// Where a remote service lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    /// `None` for services that take no login, such as the publications file.
    pub credentials: Option<ServiceCredentials>,
    /// Deadline for a single request.
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            timeout,
        }
    }

    pub fn with_credentials(mut self, credentials: ServiceCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Creates collaborators for endpoints.
///
/// Transport implementations plug in here. A connector is consulted only for
/// collaborators the caller did not hand over directly.
pub trait Connector: Send + Sync {
    fn aggregator(&self, endpoint: &Endpoint) -> Result<Arc<dyn AggregationService>>;

    fn extender(&self, endpoint: &Endpoint) -> Result<Arc<dyn ExtendingService>>;

    fn publication_source(&self, endpoint: &Endpoint) -> Result<Arc<dyn PublicationSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_key_is_redacted() {
        let endpoint = Endpoint::new("https://gw.example.com", Duration::from_secs(5))
            .with_credentials(ServiceCredentials::new("user", "s3cret"));
        let debug = format!("{endpoint:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("s3cret"));
    }
}

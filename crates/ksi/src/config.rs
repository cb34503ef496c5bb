//! Client configuration.

use std::env;
use std::time::Duration;

use ksi_core::HashAlgorithm;
use ksi_service::Endpoint;

use crate::error::{KsiError, Result};

pub use ksi_service::ServiceCredentials;

/// Default location of the Guardtime publications file.
pub const DEFAULT_PUBLICATIONS_FILE_URL: &str = "http://verify.guardtime.com/ksi-publications.bin";

/// Default subject constraint for publications file certificates.
pub const DEFAULT_CERTIFICATE_CONSTRAINT: &str = "E=publications@guardtime.com";

/// Configuration for [`Ksi`](crate::Ksi).
#[derive(Debug, Clone)]
pub struct KsiConfig {
    pub aggregator_url: String,
    pub extender_url: String,
    pub publications_file_url: String,
    pub credentials: ServiceCredentials,
    /// Subject constraint a calendar signing certificate must satisfy.
    pub publications_file_certificate_constraint: String,
    /// Algorithm used by `sign_bytes` and local aggregation.
    pub hash_algorithm: HashAlgorithm,
    /// Let the default policy extend unextended signatures.
    pub extending_allowed: bool,
    /// Deadline for each request a [`Connector`](ksi_service::Connector)-built
    /// collaborator makes.
    pub request_timeout: Duration,
    pub publications_file_max_age: Duration,
}

impl Default for KsiConfig {
    fn default() -> Self {
        Self {
            aggregator_url: "http://localhost:8080/gt-signingservice".to_string(),
            extender_url: "http://localhost:8081/gt-extendingservice".to_string(),
            publications_file_url: DEFAULT_PUBLICATIONS_FILE_URL.to_string(),
            credentials: ServiceCredentials::new("anon", "anon"),
            publications_file_certificate_constraint: DEFAULT_CERTIFICATE_CONSTRAINT.to_string(),
            hash_algorithm: HashAlgorithm::DEFAULT,
            extending_allowed: true,
            request_timeout: Duration::from_secs(30),
            publications_file_max_age: Duration::from_secs(8 * 60 * 60),
        }
    }
}

impl KsiConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KSI_AGGREGATOR_URL`: Signing service endpoint
    /// - `KSI_EXTENDER_URL`: Extending service endpoint
    /// - `KSI_PUBLICATIONS_FILE_URL`: Publications file location
    ///   (default: http://verify.guardtime.com/ksi-publications.bin)
    /// - `KSI_LOGIN_ID`, `KSI_LOGIN_KEY`: Service credentials
    /// - `KSI_CERTIFICATE_CONSTRAINT`: Certificate subject constraint
    ///   (default: E=publications@guardtime.com)
    /// - `KSI_HASH_ALGORITHM`: Hash algorithm name (default: SHA-256)
    /// - `KSI_EXTENDING_ALLOWED`: Allow extension during verification (default: true)
    /// - `KSI_REQUEST_TIMEOUT_SECS`: Request timeout (default: 30)
    ///
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            aggregator_url: env::var("KSI_AGGREGATOR_URL").unwrap_or(defaults.aggregator_url),

            extender_url: env::var("KSI_EXTENDER_URL").unwrap_or(defaults.extender_url),

            publications_file_url: env::var("KSI_PUBLICATIONS_FILE_URL")
                .unwrap_or(defaults.publications_file_url),

            credentials: ServiceCredentials {
                login_id: env::var("KSI_LOGIN_ID").unwrap_or(defaults.credentials.login_id),
                login_key: env::var("KSI_LOGIN_KEY").unwrap_or(defaults.credentials.login_key),
            },

            publications_file_certificate_constraint: env::var("KSI_CERTIFICATE_CONSTRAINT")
                .unwrap_or(defaults.publications_file_certificate_constraint),

            hash_algorithm: env::var("KSI_HASH_ALGORITHM")
                .ok()
                .and_then(|v| HashAlgorithm::from_name(&v))
                .unwrap_or(defaults.hash_algorithm),

            extending_allowed: env::var("KSI_EXTENDING_ALLOWED")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.extending_allowed),

            request_timeout: env::var("KSI_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),

            publications_file_max_age: defaults.publications_file_max_age,
        }
    }

    /// The signing gateway, with the service login.
    pub fn aggregator_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.aggregator_url, self.request_timeout)
            .with_credentials(self.credentials.clone())
    }

    /// The extender, with the service login.
    pub fn extender_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.extender_url, self.request_timeout)
            .with_credentials(self.credentials.clone())
    }

    /// The publications file. It is fetched without a login.
    pub fn publications_file_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.publications_file_url, self.request_timeout)
    }

    /// Reject unusable endpoints and settings.
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("aggregator_url", &self.aggregator_url),
            ("extender_url", &self.extender_url),
            ("publications_file_url", &self.publications_file_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(KsiError::Configuration(format!(
                    "{name} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        if !self.hash_algorithm.is_implemented() {
            return Err(KsiError::Configuration(format!(
                "hash algorithm {} is not supported",
                self.hash_algorithm
            )));
        }
        if self.hash_algorithm.is_deprecated() {
            return Err(KsiError::Configuration(format!(
                "hash algorithm {} is deprecated",
                self.hash_algorithm
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(KsiError::Configuration("request_timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KsiConfig::default();
        assert_eq!(config.publications_file_url, DEFAULT_PUBLICATIONS_FILE_URL);
        assert_eq!(
            config.publications_file_certificate_constraint,
            "E=publications@guardtime.com"
        );
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha2_256);
        assert!(config.extending_allowed);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_endpoints() {
        let config = KsiConfig {
            aggregator_url: String::new(),
            ..KsiConfig::default()
        };
        assert!(matches!(config.validate(), Err(KsiError::Configuration(_))));

        let config = KsiConfig {
            extender_url: "ftp://extender".into(),
            ..KsiConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_weak_algorithm() {
        let config = KsiConfig {
            hash_algorithm: HashAlgorithm::Sha1,
            ..KsiConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_login_key_is_redacted() {
        let config = KsiConfig {
            credentials: ServiceCredentials::new("user", "s3cret"),
            ..KsiConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_endpoints_carry_url_login_and_timeout() {
        let config = KsiConfig {
            aggregator_url: "https://gw.example.com/sign".into(),
            credentials: ServiceCredentials::new("user", "key"),
            request_timeout: Duration::from_secs(5),
            ..KsiConfig::default()
        };

        let aggregator = config.aggregator_endpoint();
        assert_eq!(aggregator.url, "https://gw.example.com/sign");
        assert_eq!(aggregator.credentials, Some(ServiceCredentials::new("user", "key")));
        assert_eq!(aggregator.timeout, Duration::from_secs(5));

        assert_eq!(config.extender_endpoint().url, config.extender_url);
        let publications = config.publications_file_endpoint();
        assert_eq!(publications.url, DEFAULT_PUBLICATIONS_FILE_URL);
        assert!(publications.credentials.is_none());
        assert_eq!(publications.timeout, Duration::from_secs(5));
    }
}

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use url::Url;

use crate::{error::WileedotError, tls::HostPolicy};

use super::{LogLevel, TlsVersion};

/// Default Let's Encrypt production directory URL
pub const LETS_ENCRYPT_PRODUCTION_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory URL (for testing)
pub const LETS_ENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Default TLS port used when no base listener is supplied
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Default period between certificate checks (daily)
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted renewal period, certificates never live this long
pub const MAX_RENEWAL_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration for a [`crate::TlsListener`]
///
/// `domain` and `cert_directory` are required, everything else has a default.
///
/// # Example
/// ```
/// use wileedot::config::Config;
///
/// let config = Config::new("example.com", "./certs")
///     .allowed_domain("www.example.com")
///     .email("admin@example.com")
///     .staging();
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The primary domain for the certificate
    #[serde(default)]
    pub domain: String,

    /// Additional domains allowed on the certificate (default: none)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_domains: Vec<String>,

    /// The directory certificates and the ACME account are cached in
    #[serde(default)]
    pub cert_directory: PathBuf,

    /// Contact email registered with the ACME directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Address to bind when no base listener is supplied (default: 0.0.0.0:443)
    #[serde(default = "Config::default_bind_address")]
    pub bind_address: SocketAddr,

    /// ACME directory URL (default: Let's Encrypt production)
    #[serde(default = "Config::default_directory_url")]
    pub directory_url: String,

    /// Seconds between certificate checks (default: 86400)
    #[serde(default = "Config::default_renewal_interval")]
    pub renewal_interval: u64,

    /// The lowest TLS version accepted (default: "1.2")
    #[serde(default)]
    pub min_tls_version: TlsVersion,

    /// ALPN protocols offered to regular clients (default: ["http/1.1"])
    #[serde(default = "Config::default_alpn_protocols")]
    pub alpn_protocols: Vec<String>,

    /// The log level to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// An existing listener to wrap instead of binding `bind_address`
    #[serde(skip)]
    pub base_listener: Option<TcpListener>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            domain: String::new(),
            allowed_domains: Vec::new(),
            cert_directory: PathBuf::new(),
            email: None,
            bind_address: Self::default_bind_address(),
            directory_url: Self::default_directory_url(),
            renewal_interval: Self::default_renewal_interval(),
            min_tls_version: TlsVersion::default(),
            alpn_protocols: Self::default_alpn_protocols(),
            log_level: None,
            base_listener: None,
        }
    }
}

impl Config {
    pub fn new(domain: impl Into<String>, cert_directory: impl Into<PathBuf>) -> Self {
        Config {
            domain: domain.into(),
            cert_directory: cert_directory.into(),
            ..Default::default()
        }
    }

    fn default_bind_address() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_TLS_PORT)
    }

    fn default_directory_url() -> String {
        LETS_ENCRYPT_PRODUCTION_URL.to_string()
    }

    fn default_renewal_interval() -> u64 {
        DEFAULT_RENEWAL_INTERVAL.as_secs()
    }

    fn default_alpn_protocols() -> Vec<String> {
        vec!["http/1.1".to_string()]
    }

    /// Add a domain to the allow-list
    pub fn allowed_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains.push(domain.into());
        self
    }

    /// Add several domains to the allow-list
    pub fn allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains.extend(domains.into_iter().map(Into::into));
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Wrap an already bound listener instead of binding a new one
    pub fn base_listener(mut self, listener: TcpListener) -> Self {
        self.base_listener = Some(listener);
        self
    }

    pub fn directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    /// Use the Let's Encrypt staging directory.
    ///
    /// Staging certificates are not trusted by browsers but the rate limits are
    /// far more generous, which makes it the right choice while testing.
    pub fn staging(self) -> Self {
        self.directory_url(LETS_ENCRYPT_STAGING_URL)
    }

    /// Set the renewal period, rounded up to whole seconds
    pub fn renewal_interval(mut self, interval: Duration) -> Self {
        self.renewal_interval = interval
            .as_secs()
            .saturating_add(u64::from(interval.subsec_nanos() > 0));
        self
    }

    pub fn min_tls_version(mut self, version: TlsVersion) -> Self {
        self.min_tls_version = version;
        self
    }

    pub fn alpn_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alpn_protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Period of the renewal timer
    pub fn renewal_period(&self) -> Duration {
        Duration::from_secs(self.renewal_interval)
    }

    /// ACME contact URIs derived from `email`
    pub fn contacts(&self) -> Vec<String> {
        self.email
            .iter()
            .map(|email| email.trim())
            .filter(|email| !email.is_empty())
            .map(|email| format!("mailto:{email}"))
            .collect()
    }

    /// The host policy: the primary domain followed by the allowed domains
    pub fn host_policy(&self) -> HostPolicy {
        HostPolicy::new(std::iter::once(&self.domain).chain(self.allowed_domains.iter()))
    }

    /// Check the configuration for missing or malformed values
    pub fn validate(&self) -> Result<(), WileedotError> {
        if self.domain.trim().is_empty() {
            return Err(WileedotError::MissingDomain);
        }

        if self.cert_directory.as_os_str().is_empty() {
            return Err(WileedotError::MissingCertDirectory);
        }

        validate_domain(&self.domain)?;
        for domain in &self.allowed_domains {
            validate_domain(domain)?;
        }

        if self.renewal_interval == 0 || self.renewal_interval > MAX_RENEWAL_INTERVAL.as_secs() {
            return Err(WileedotError::InvalidRenewalInterval);
        }

        let url = Url::parse(&self.directory_url).map_err(|e| WileedotError::InvalidDirectoryUrl {
            url: self.directory_url.clone(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(WileedotError::InvalidDirectoryUrl {
                url: self.directory_url.clone(),
                message: format!("unsupported scheme `{}`", url.scheme()),
            });
        }

        Ok(())
    }
}

/// A domain is valid when it parses as the bare host of a URL
fn validate_domain(domain: &str) -> Result<(), WileedotError> {
    let invalid = |message: &str| WileedotError::InvalidDomain {
        domain: domain.to_string(),
        message: message.to_string(),
    };

    let name = domain.trim();
    if name.is_empty() {
        return Err(invalid("domain name is empty"));
    }

    if name.contains("://") || name.contains(['/', ':', '@', '?', '#']) {
        return Err(invalid("expected a bare host name"));
    }

    let url = Url::parse(&format!("https://{name}")).map_err(|e| invalid(&e.to_string()))?;
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case(name) => Ok(()),
        _ => Err(invalid("not a valid host name")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("example.com", "/tmp/certs");

        assert_eq!(config.bind_address.port(), DEFAULT_TLS_PORT);
        assert_eq!(config.directory_url, LETS_ENCRYPT_PRODUCTION_URL);
        assert_eq!(config.renewal_period(), DEFAULT_RENEWAL_INTERVAL);
        assert_eq!(config.min_tls_version, TlsVersion::Tls12);
        assert_eq!(config.alpn_protocols, vec!["http/1.1".to_string()]);
        assert!(config.allowed_domains.is_empty());
        assert!(config.base_listener.is_none());
    }

    #[test]
    fn test_validate_missing_fields() {
        let err = Config::new("", "/tmp/certs").validate().unwrap_err();
        assert!(matches!(err, WileedotError::MissingDomain));

        let err = Config::new("   ", "/tmp/certs").validate().unwrap_err();
        assert!(matches!(err, WileedotError::MissingDomain));

        let err = Config::new("example.com", "").validate().unwrap_err();
        assert!(matches!(err, WileedotError::MissingCertDirectory));
    }

    #[test]
    fn test_validate_domains() {
        assert!(Config::new("example.com", "certs").validate().is_ok());
        assert!(Config::new("localhost", "certs").validate().is_ok());
        assert!(
            Config::new("example.com", "certs")
                .allowed_domains(["www.example.com", "api.example.com"])
                .validate()
                .is_ok()
        );

        for bad in ["https://example.com", "example.com/path", "exa mple.com", "example.com:443"] {
            let err = Config::new(bad, "certs").validate().unwrap_err();
            assert!(
                matches!(err, WileedotError::InvalidDomain { .. }),
                "expected {bad} to be rejected, got {err:?}"
            );
        }

        let err = Config::new("example.com", "certs")
            .allowed_domain("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, WileedotError::InvalidDomain { .. }));
    }

    #[test]
    fn test_validate_renewal_interval() {
        let mut config = Config::new("example.com", "certs");
        config.renewal_interval = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WileedotError::InvalidRenewalInterval));

        let err = Config::new("example.com", "certs")
            .renewal_interval(MAX_RENEWAL_INTERVAL + Duration::from_secs(1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, WileedotError::InvalidRenewalInterval));

        let mut config = Config::new("example.com", "certs");
        config.renewal_interval = i64::MAX as u64;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WileedotError::InvalidRenewalInterval));

        let config = Config::new("example.com", "certs").renewal_interval(MAX_RENEWAL_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_renewal_interval_rounds_up() {
        let config = Config::new("example.com", "certs")
            .renewal_interval(Duration::from_millis(1500));
        assert_eq!(config.renewal_interval, 2);

        let config = Config::new("example.com", "certs")
            .renewal_interval(Duration::from_millis(10));
        assert_eq!(config.renewal_interval, 1);
        assert!(config.validate().is_ok());

        let config = Config::new("example.com", "certs").renewal_interval(Duration::from_secs(60));
        assert_eq!(config.renewal_interval, 60);
    }

    #[test]
    fn test_validate_directory_url() {
        let err = Config::new("example.com", "certs")
            .directory_url("not a url")
            .validate()
            .unwrap_err();
        assert!(matches!(err, WileedotError::InvalidDirectoryUrl { .. }));

        let err = Config::new("example.com", "certs")
            .directory_url("ftp://acme.example.com/directory")
            .validate()
            .unwrap_err();
        assert!(matches!(err, WileedotError::InvalidDirectoryUrl { .. }));

        let config = Config::new("example.com", "certs").staging();
        assert_eq!(config.directory_url, LETS_ENCRYPT_STAGING_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_contacts() {
        let config = Config::new("example.com", "certs");
        assert!(config.contacts().is_empty());

        let config = config.email("admin@example.com");
        assert_eq!(config.contacts(), vec!["mailto:admin@example.com".to_string()]);
    }

    #[test]
    fn test_host_policy_includes_primary_domain_first() {
        let config = Config::new("Example.com", "certs")
            .allowed_domains(["www.example.com", "example.com"]);

        let policy = config.host_policy();
        assert_eq!(
            policy.domains(),
            &["example.com".to_string(), "www.example.com".to_string()]
        );
    }
}

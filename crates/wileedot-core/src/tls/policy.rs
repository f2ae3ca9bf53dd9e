// Host allow-list and the certificate resolver enforcing it

use std::sync::Arc;

use log::debug;
use rustls::{
    server::{ClientHello, ResolvesServerCert},
    sign::CertifiedKey,
};

use crate::error::WileedotError;

/// The set of names certificates may be served and issued for
///
/// Names are compared case-insensitively. Order is preserved, the first entry is
/// the primary domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPolicy {
    domains: Vec<String>,
}

impl HostPolicy {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for domain in domains {
            let domain = normalize(domain.as_ref());
            if !domain.is_empty() && !normalized.contains(&domain) {
                normalized.push(domain);
            }
        }

        Self {
            domains: normalized,
        }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn allows(&self, server_name: &str) -> bool {
        let name = normalize(server_name);
        self.domains.iter().any(|domain| *domain == name)
    }

    /// Like [`HostPolicy::allows`] but as an error suitable for `?`
    pub fn check(&self, server_name: &str) -> Result<(), WileedotError> {
        if self.allows(server_name) {
            Ok(())
        } else {
            Err(WileedotError::HostNotAllowed(server_name.to_string()))
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

/// Resolver that only hands out certificates for names allowed by the policy
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    policy: HostPolicy,
    inner: Arc<dyn ResolvesServerCert>,
}

impl PolicyResolver {
    pub fn new(policy: HostPolicy, inner: Arc<dyn ResolvesServerCert>) -> Self {
        Self { policy, inner }
    }
}

impl ResolvesServerCert for PolicyResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let Some(server_name) = client_hello.server_name() else {
            debug!("Rejecting TLS handshake without a server name");
            return None;
        };

        if !self.policy.allows(server_name) {
            debug!("Rejecting TLS handshake for disallowed host: {server_name}");
            return None;
        }

        self.inner.resolve(client_hello)
    }
}

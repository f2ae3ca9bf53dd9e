// TLS module: the certificate manager capability, ACME integration and host policy

pub mod acme;
pub mod cache;
pub mod cert;
pub mod policy;

use std::{future::Future, path::PathBuf, sync::Arc};

use rustls::{ServerConfig, server::ClientHello, sign::CertifiedKey};

use crate::{
    config::{Config, TlsVersion},
    error::WileedotError,
};

pub use self::{
    acme::AcmeManager,
    cert::CertInfo,
    policy::{HostPolicy, PolicyResolver},
};

/// ALPN protocol identifier of the ACME TLS-ALPN-01 challenge (RFC 8737)
pub const ACME_TLS_ALPN_NAME: &[u8] = b"acme-tls/1";

/// Whether a client hello belongs to an ACME TLS-ALPN-01 validation request
pub fn is_tls_alpn_challenge(client_hello: &ClientHello<'_>) -> bool {
    client_hello
        .alpn()
        .into_iter()
        .flatten()
        .eq([ACME_TLS_ALPN_NAME])
}

/// Everything a certificate manager needs to be constructed
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Directory certificates and account keys are cached in
    pub cache_dir: PathBuf,
    /// Names the manager may issue and serve certificates for
    pub policy: HostPolicy,
    /// Contact URIs, e.g. `mailto:admin@example.com`
    pub contacts: Vec<String>,
    pub directory_url: String,
    pub min_tls_version: TlsVersion,
    /// ALPN protocols offered to regular clients
    pub alpn_protocols: Vec<String>,
}

impl From<&Config> for ManagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            cache_dir: config.cert_directory.clone(),
            policy: config.host_policy(),
            contacts: config.contacts(),
            directory_url: config.directory_url.clone(),
            min_tls_version: config.min_tls_version,
            alpn_protocols: config.alpn_protocols.clone(),
        }
    }
}

/// The external collaborator responsible for obtaining, caching and serving
/// certificates.
///
/// The listener only relies on these three operations, anything protocol
/// specific stays behind this trait.
pub trait CertificateManager: Send + Sync + Sized + 'static {
    /// Construct the manager with its cache directory and host policy
    fn build(options: ManagerOptions) -> Result<Self, WileedotError>;

    /// The TLS configuration handshakes are performed with
    fn tls_config(&self) -> Arc<ServerConfig>;

    /// The certificate currently served for `server_name`.
    ///
    /// Implementations re-validate and reissue when needed, otherwise the
    /// cached certificate is returned unchanged.
    fn certificate(
        &self,
        server_name: &str,
    ) -> impl Future<Output = Result<Arc<CertifiedKey>, WileedotError>> + Send;
}

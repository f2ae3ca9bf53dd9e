// ACME certificate manager backed by tokio-rustls-acme
//
// Certificates are obtained with TLS-ALPN-01 validation, so challenges are
// answered on the same port as regular TLS traffic. Issuance and renewal are
// driven by polling the ACME state stream in a background task.

use std::{path::PathBuf, sync::Arc};

use futures_util::StreamExt;
use log::{debug, error, info};
use rustls::{ServerConfig, server::ResolvesServerCert, sign::CertifiedKey};
use tokio::sync::RwLock;
use tokio_rustls_acme::{AcmeConfig, caches::DirCache};
use tokio_util::sync::CancellationToken;

use crate::error::WileedotError;

use super::{
    ACME_TLS_ALPN_NAME, CertificateManager, ManagerOptions,
    cache::{RecordingCache, create_cert_directory, load_cached_pem},
    cert::certified_key_from_pem,
    policy::{HostPolicy, PolicyResolver},
};

/// Certificate manager issuing and renewing certificates through an ACME directory
pub struct AcmeManager {
    policy: HostPolicy,
    directory_url: String,
    tls_config: Arc<ServerConfig>,
    latest: Arc<RwLock<Option<Vec<u8>>>>,
    disk: DirCache<PathBuf>,
    shutdown: CancellationToken,
}

impl AcmeManager {
    /// The domains requested on the certificate
    pub fn domains(&self) -> &[String] {
        self.policy.domains()
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    /// The most recent certificate PEM, from memory or the on-disk cache
    async fn current_pem(&self) -> Result<Option<Vec<u8>>, WileedotError> {
        if let Some(pem) = self.latest.read().await.clone() {
            return Ok(Some(pem));
        }

        let cached = load_cached_pem(&self.disk, self.policy.domains(), &self.directory_url).await?;

        if let Some(pem) = &cached {
            *self.latest.write().await = Some(pem.clone());
        }

        Ok(cached)
    }
}

impl CertificateManager for AcmeManager {
    fn build(options: ManagerOptions) -> Result<Self, WileedotError> {
        if options.policy.is_empty() {
            return Err(WileedotError::TlsInitializationFailed(
                "At least one domain is required".to_string(),
            ));
        }

        info!(
            "Initializing ACME for domains: {:?}",
            options.policy.domains()
        );
        info!("Using ACME directory: {}", options.directory_url);

        // Install default crypto provider if not already installed
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let cache_dir = create_cert_directory(&options.cache_dir)?;
        let cache = RecordingCache::new(cache_dir.clone());
        let latest = cache.latest_handle();

        let mut config = AcmeConfig::new(options.policy.domains().to_vec())
            .directory(&options.directory_url);
        for contact in &options.contacts {
            config = config.contact_push(contact);
        }
        let config = config.cache(cache);

        let mut state = config.state();
        let acme_resolver: Arc<dyn ResolvesServerCert> = state.resolver();
        let resolver = PolicyResolver::new(options.policy.clone(), acme_resolver);

        let mut tls_config =
            ServerConfig::builder_with_protocol_versions(options.min_tls_version.protocol_versions())
                .with_no_client_auth()
                .with_cert_resolver(Arc::new(resolver));
        tls_config.alpn_protocols = options
            .alpn_protocols
            .iter()
            .map(|protocol| protocol.as_bytes().to_vec())
            .chain(std::iter::once(ACME_TLS_ALPN_NAME.to_vec()))
            .collect();

        // Drive certificate issuance and renewal until the manager is dropped
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let domains = options.policy.domains().to_vec();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("ACME event loop for {domains:?} cancelled");
                        break;
                    }
                    event = state.next() => match event {
                        Some(Ok(event)) => info!("ACME event for {domains:?}: {event:?}"),
                        Some(Err(err)) => error!("ACME error for {domains:?}: {err:?}"),
                        None => {
                            info!("ACME state stream ended for {domains:?}");
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            policy: options.policy,
            directory_url: options.directory_url,
            tls_config: Arc::new(tls_config),
            latest,
            disk: DirCache::new(cache_dir),
            shutdown,
        })
    }

    fn tls_config(&self) -> Arc<ServerConfig> {
        self.tls_config.clone()
    }

    async fn certificate(&self, server_name: &str) -> Result<Arc<CertifiedKey>, WileedotError> {
        self.policy.check(server_name)?;

        match self.current_pem().await? {
            Some(pem) => certified_key_from_pem(&pem),
            None => Err(WileedotError::CertificateUnavailable(server_name.to_string())),
        }
    }
}

impl Drop for AcmeManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

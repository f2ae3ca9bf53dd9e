#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use rustls::{
    ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::{ClientHello, ResolvesServerCert},
    sign::CertifiedKey,
};
use wileedot::{
    config::Config,
    error::WileedotError,
    tls::{ACME_TLS_ALPN_NAME, CertificateManager, ManagerOptions, PolicyResolver},
};

pub const CERT_PEM: &[u8] = include_bytes!("../fixtures/test.example.com.crt");
pub const KEY_PEM: &[u8] = include_bytes!("../fixtures/test.example.com.key");

// Initialize crypto provider for tests
pub fn init_crypto() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn test_chain() -> Vec<CertificateDer<'static>> {
    let mut reader = CERT_PEM;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

pub fn test_key() -> PrivateKeyDer<'static> {
    let mut reader = KEY_PEM;
    rustls_pemfile::private_key(&mut reader).unwrap().unwrap()
}

/// Resolver handing out the same certificate for every hello
#[derive(Debug)]
pub struct FixedResolver(pub Arc<CertifiedKey>);

impl ResolvesServerCert for FixedResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.0.clone())
    }
}

pub fn fixture_key() -> Arc<CertifiedKey> {
    init_crypto();
    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&test_key()).unwrap();
    Arc::new(CertifiedKey::new(test_chain(), signing_key))
}

/// Certificate manager serving the fixture certificate and recording every request
pub struct MockManager {
    pub options: ManagerOptions,
    key: Arc<CertifiedKey>,
    tls_config: Arc<ServerConfig>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockManager {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl CertificateManager for MockManager {
    fn build(options: ManagerOptions) -> Result<Self, WileedotError> {
        init_crypto();

        let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&test_key())
            .map_err(|e| WileedotError::TlsInitializationFailed(e.to_string()))?;
        let key = Arc::new(CertifiedKey::new(test_chain(), signing_key));

        let resolver = PolicyResolver::new(
            options.policy.clone(),
            Arc::new(FixedResolver(key.clone())),
        );
        let mut tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_cert_resolver(Arc::new(resolver));
        tls_config.alpn_protocols = vec![b"http/1.1".to_vec(), ACME_TLS_ALPN_NAME.to_vec()];

        Ok(Self {
            options,
            key,
            tls_config: Arc::new(tls_config),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    fn tls_config(&self) -> Arc<ServerConfig> {
        self.tls_config.clone()
    }

    async fn certificate(&self, server_name: &str) -> Result<Arc<CertifiedKey>, WileedotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(server_name.to_string());

        self.options.policy.check(server_name)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(WileedotError::CertificateUnavailable(server_name.to_string()));
        }

        Ok(self.key.clone())
    }
}

/// A config for `example.com` bound to an ephemeral localhost port
pub fn local_config(cert_dir: &Path) -> Config {
    Config::new("example.com", cert_dir)
        .allowed_domain("www.example.com")
        .email("admin@example.com")
        .bind_address("127.0.0.1:0".parse().unwrap())
}

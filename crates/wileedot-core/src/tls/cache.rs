// Certificate cache directory handling and the recording cache wrapper

use std::{
    fmt::{self, Display},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;
use tokio_rustls_acme::{AccountCache, CertCache, caches::DirCache};

use crate::error::WileedotError;

use super::{
    ManagerOptions,
    cert::{CertInfo, certified_key_from_pem},
};

/// Create the certificate directory if it does not exist yet
pub fn create_cert_directory(cert_dir: &Path) -> Result<PathBuf, WileedotError> {
    fs::create_dir_all(cert_dir).map_err(|e| WileedotError::CertificateDirectoryCreationFailed {
        path: cert_dir.display().to_string(),
        message: e.to_string(),
    })?;

    if !cert_dir.is_dir() {
        return Err(WileedotError::CertificateDirectoryCreationFailed {
            path: cert_dir.display().to_string(),
            message: "path exists but is not a directory".to_string(),
        });
    }

    return Ok(cert_dir.to_path_buf());
}

/// Read the cached certificate PEM for a set of domains straight from disk
pub async fn load_cached_pem(
    cache: &DirCache<PathBuf>,
    domains: &[String],
    directory_url: &str,
) -> Result<Option<Vec<u8>>, WileedotError> {
    cache
        .load_cert(domains, directory_url)
        .await
        .map_err(|e| WileedotError::CacheError(e.to_string()))
}

/// Validity of the certificate cached for `options`, if one was issued before.
///
/// Only the cache directory is read, no ACME traffic happens.
pub async fn cached_cert_info(options: &ManagerOptions) -> Result<Option<CertInfo>, WileedotError> {
    let cache = DirCache::new(options.cache_dir.clone());
    let Some(pem) =
        load_cached_pem(&cache, options.policy.domains(), &options.directory_url).await?
    else {
        return Ok(None);
    };

    let key = certified_key_from_pem(&pem)?;
    CertInfo::from_certified_key(&key).map(Some)
}

/// A [`DirCache`] that remembers the last certificate it loaded or stored.
///
/// The ACME state only reports events, never the certificate itself, so this is
/// how the manager learns which certificate is currently deployed.
pub struct RecordingCache {
    inner: DirCache<PathBuf>,
    dir: PathBuf,
    latest: Arc<RwLock<Option<Vec<u8>>>>,
}

impl RecordingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            inner: DirCache::new(dir.clone()),
            dir,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Shared handle to the most recent certificate PEM
    pub fn latest_handle(&self) -> Arc<RwLock<Option<Vec<u8>>>> {
        self.latest.clone()
    }

    pub async fn latest(&self) -> Option<Vec<u8>> {
        self.latest.read().await.clone()
    }

    async fn record(&self, pem: &[u8]) {
        *self.latest.write().await = Some(pem.to_vec());
    }
}

impl Display for RecordingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordingCache({})", self.dir.display())
    }
}

#[async_trait]
impl CertCache for RecordingCache {
    type EC = std::io::Error;

    async fn load_cert(
        &self,
        domains: &[String],
        directory_url: &str,
    ) -> Result<Option<Vec<u8>>, Self::EC> {
        let cert = self.inner.load_cert(domains, directory_url).await?;
        if let Some(pem) = &cert {
            debug!("Loaded cached certificate for {domains:?}");
            self.record(pem).await;
        }

        Ok(cert)
    }

    async fn store_cert(
        &self,
        domains: &[String],
        directory_url: &str,
        cert: &[u8],
    ) -> Result<(), Self::EC> {
        self.inner.store_cert(domains, directory_url, cert).await?;
        debug!("Stored new certificate for {domains:?}");
        self.record(cert).await;
        Ok(())
    }
}

#[async_trait]
impl AccountCache for RecordingCache {
    type EA = std::io::Error;

    async fn load_account(
        &self,
        contact: &[String],
        directory_url: &str,
    ) -> Result<Option<Vec<u8>>, Self::EA> {
        self.inner.load_account(contact, directory_url).await
    }

    async fn store_account(
        &self,
        contact: &[String],
        directory_url: &str,
        account: &[u8],
    ) -> Result<(), Self::EA> {
        self.inner
            .store_account(contact, directory_url, account)
            .await
    }
}

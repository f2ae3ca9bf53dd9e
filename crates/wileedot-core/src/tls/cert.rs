// Certificate parsing and validity inspection

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use rustls_pemfile::{certs, private_key};

use crate::error::WileedotError;

/// A certificate is due for renewal once it is this many days old
pub const RENEW_AFTER_DAYS: i64 = 60;

/// A certificate is due for renewal when it expires within this many days
pub const RENEW_BEFORE_EXPIRY_DAYS: i64 = 30;

/// Validity window of the active certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertInfo {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertInfo {
    /// Read the validity window from a DER encoded certificate
    pub fn from_der(der: &CertificateDer<'_>) -> Result<Self, WileedotError> {
        let (_, cert) = x509_parser::parse_x509_certificate(der.as_ref()).map_err(|e| {
            WileedotError::InvalidCertificate(format!("Failed to parse certificate: {e}"))
        })?;

        let validity = cert.validity();
        Ok(CertInfo {
            not_before: timestamp(validity.not_before.timestamp())?,
            not_after: timestamp(validity.not_after.timestamp())?,
        })
    }

    /// Read the validity window of the leaf certificate of a chain
    pub fn from_certified_key(key: &CertifiedKey) -> Result<Self, WileedotError> {
        let leaf = key.cert.first().ok_or_else(|| {
            WileedotError::InvalidCertificate("Certificate chain is empty".to_string())
        })?;

        Self::from_der(leaf)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now < self.not_after
    }

    /// Time left until expiry, negative once expired
    pub fn expires_in(&self, now: DateTime<Utc>) -> TimeDelta {
        self.not_after - now
    }

    /// Whether the certificate is old enough, or close enough to expiry, to renew
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        let age = now - self.not_before;
        age >= TimeDelta::days(RENEW_AFTER_DAYS)
            || self.expires_in(now) <= TimeDelta::days(RENEW_BEFORE_EXPIRY_DAYS)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, WileedotError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        WileedotError::InvalidCertificate(format!("Timestamp {secs} is out of range"))
    })
}

/// Parse a PEM bundle holding a private key and a certificate chain.
///
/// This is the layout the ACME cache stores certificates in: the key first,
/// followed by the leaf certificate and its issuers.
pub fn certified_key_from_pem(pem: &[u8]) -> Result<Arc<CertifiedKey>, WileedotError> {
    let mut reader = pem;
    let chain = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            WileedotError::InvalidCertificate(format!("Failed to parse certificate chain: {e}"))
        })?;

    if chain.is_empty() {
        return Err(WileedotError::InvalidCertificate(
            "No certificate found in PEM bundle".to_string(),
        ));
    }

    let mut reader = pem;
    let key = private_key(&mut reader)
        .map_err(|e| {
            WileedotError::InvalidCertificate(format!("Failed to parse private key: {e}"))
        })?
        .ok_or_else(|| {
            WileedotError::InvalidCertificate("No private key found in PEM bundle".to_string())
        })?;

    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key)
        .map_err(|e| WileedotError::InvalidCertificate(format!("Invalid private key: {e}")))?;

    Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
}

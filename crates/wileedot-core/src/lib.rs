//! A TCP listener with automatic TLS certificates.
//!
//! [`TlsListener`] binds (or wraps) a TCP listener and serves TLS with
//! certificates obtained from an ACME directory such as Let's Encrypt. A
//! background timer keeps asking the certificate manager for the current
//! certificate so it is reissued before it expires.
//!
//! The ACME protocol, certificate caching and the TLS handshake itself are
//! handled by `tokio-rustls-acme` and `rustls`.

pub mod config;
pub mod error;
pub mod listener;
pub mod renewal;
pub mod tls;

pub use listener::{IncomingConnection, TlsListener};

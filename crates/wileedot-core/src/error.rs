use std::io::Error as StdError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WileedotError {
    #[error("Domain is required")]
    MissingDomain,

    #[error("Certificate directory is required")]
    MissingCertDirectory,

    #[error("Invalid domain `{domain}`: {message}")]
    InvalidDomain { domain: String, message: String },

    #[error("Renewal interval must be between one second and one year")]
    InvalidRenewalInterval,

    #[error("Invalid ACME directory URL `{url}`: {message}")]
    InvalidDirectoryUrl { url: String, message: String },

    #[error("Error in `{field}`: {message}")]
    ParseError { field: String, message: String },

    #[error("Failed to read config file, reason: {0:?}")]
    FailedToReadConfig(StdError),

    #[error("Config file not found at the specified path `{0}`")]
    ConfigNotFound(String),

    #[error("The target directory does not exist or is not a directory: {0}")]
    TargetDirNotExists(String),

    #[error("Config file already exists at the specified path `{0}`")]
    ConfigAlreadyExists(String),

    #[error("Failed to write config file, reason: {0:?}")]
    FailedToWriteConfig(StdError),

    #[error("Failed to setup TLS listener: {0}")]
    SetupFailed(#[source] Box<WileedotError>),

    #[error("Failed to bind to `{address}`, reason: {source}")]
    FailedToBind {
        address: String,
        #[source]
        source: StdError,
    },

    #[error("Failed to create certificate directory at `{path}`: {message}")]
    CertificateDirectoryCreationFailed { path: String, message: String },

    #[error("TLS initialization failed: {0}")]
    TlsInitializationFailed(String),

    #[error("Listener is closed")]
    ListenerClosed,

    #[error("Failed to accept connection, reason: {0}")]
    FailedToAcceptConnection(#[source] StdError),

    #[error("TLS handshake failed, reason: {0}")]
    Handshake(#[source] StdError),

    #[error("Host `{0}` is not allowed by the host policy")]
    HostNotAllowed(String),

    #[error("No certificate available for `{0}` yet")]
    CertificateUnavailable(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Certificate cache error: {0}")]
    CacheError(String),
}

impl WileedotError {
    /// Wraps an error raised while setting up the listener
    pub(crate) fn setup(err: WileedotError) -> Self {
        WileedotError::SetupFailed(Box::new(err))
    }

    /// Returns true for errors caused by an invalid configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            WileedotError::MissingDomain
                | WileedotError::MissingCertDirectory
                | WileedotError::InvalidDomain { .. }
                | WileedotError::InvalidRenewalInterval
                | WileedotError::InvalidDirectoryUrl { .. }
                | WileedotError::ParseError { .. }
        )
    }
}

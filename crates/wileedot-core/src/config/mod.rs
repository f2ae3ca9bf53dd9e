mod format;
#[cfg(feature = "toml")]
pub mod toml;
mod types;

pub use format::Format;
pub use types::*;

#[cfg(feature = "toml")]
use std::{
    fs,
    path::{Path, PathBuf},
};

#[cfg(feature = "toml")]
use crate::error::WileedotError;

/// Default file name used for configuration files
pub const CONFIG_FILE_NAME: &str = "wileedot.toml";

/// Starter configuration written by `init_at`
pub const CONFIG_TEMPLATE: &str = r#"# Primary domain the certificate is issued for
domain = "example.com"

# Additional names allowed on the same certificate
allowed_domains = ["www.example.com"]

# Where certificates and the ACME account are cached, must be persistent
cert_directory = "./certs"

# Contact address registered with the ACME directory
email = "admin@example.com"

bind_address = "0.0.0.0:443"

# Use https://acme-staging-v02.api.letsencrypt.org/directory while testing
directory_url = "https://acme-v02.api.letsencrypt.org/directory"

# Seconds between certificate checks
renewal_interval = 86400

min_tls_version = "1.2"
alpn_protocols = ["http/1.1"]
log_level = "info"
"#;

#[cfg(feature = "toml")]
impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Config, WileedotError> {
        toml::Toml::from(input).parse()
    }

    /// Read a config from a file, or from `wileedot.toml` inside a directory
    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, WileedotError> {
        let mut path = path.as_ref().to_path_buf();
        if path.is_dir() {
            path.push(CONFIG_FILE_NAME);
        }

        if !path.exists() {
            return Err(WileedotError::ConfigNotFound(path.display().to_string()));
        }

        let raw = fs::read_to_string(&path).map_err(WileedotError::FailedToReadConfig)?;
        Self::from_toml_str(&raw)
    }
}

/// Write the starter configuration into `dir`, returning the created file's path
#[cfg(feature = "toml")]
pub fn init_at(dir: impl AsRef<Path>) -> Result<PathBuf, WileedotError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(WileedotError::TargetDirNotExists(dir.display().to_string()));
    }

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(WileedotError::ConfigAlreadyExists(path.display().to_string()));
    }

    fs::write(&path, CONFIG_TEMPLATE).map_err(WileedotError::FailedToWriteConfig)?;
    Ok(path)
}

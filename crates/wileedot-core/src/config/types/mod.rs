mod config;
mod log;
mod tls_version;

pub use config::*;
pub use log::*;
pub use tls_version::*;

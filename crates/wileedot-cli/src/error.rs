use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum CliError {
    #[error("Failed to read the current directory: {0}")]
    Read(#[source] std::io::Error),

    #[error("{0}")]
    Wileedot(#[from] wileedot::error::WileedotError),

    #[error("HTTP connection error: {0}")]
    Http(#[from] hyper::Error),

    #[error("{0}")]
    Generic(String),
}

use std::{
    env,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use log::info;
use wileedot::{
    TlsListener,
    config::{self, Config, LogLevel},
    tls::{ManagerOptions, cache::cached_cert_info},
};

use crate::{error::CliError, server};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve HTTPS with automatically managed certificates
    Run {
        /// Path to the configuration file or its directory
        #[arg(short, long, default_value = config::CONFIG_FILE_NAME)]
        config: PathBuf,
    },

    /// Create a new wileedot configuration file in the target directory
    Init {
        /// The directory the configuration file will be created in (default: current directory)
        #[arg(required = false)]
        target_dir: Option<PathBuf>,
    },

    /// Show the validity of the cached certificate without contacting the ACME server
    CertInfo {
        /// Path to the configuration file or its directory
        #[arg(short, long, default_value = config::CONFIG_FILE_NAME)]
        config: PathBuf,
    },

    /// Print the version of the wileedot CLI
    Version,
}

#[derive(Parser, Debug)]
#[command(name = "wileedot", version, about, long_about = None)]
pub struct Cli {
    /// The log level for the application, overrides the configuration file
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,

    #[clap(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn new() -> Self {
        Cli::parse()
    }

    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.command {
            Commands::Run { config } => {
                let config = self.load_config(config)?;
                let listener = TlsListener::new(config).await?;
                server::serve(listener).await?;
            }

            Commands::Init { target_dir } => {
                self.init_logger(None);

                let target = match target_dir {
                    Some(dir) => dir.clone(),
                    None => env::current_dir().map_err(CliError::Read)?,
                };

                let path = config::init_at(&target)?;
                info!("Created new config file at `{}`", path.display());
            }

            Commands::CertInfo { config } => {
                let config = self.load_config(config)?;
                let options = ManagerOptions::from(&config);

                match cached_cert_info(&options).await? {
                    Some(info) => {
                        println!("domains:    {}", options.policy.domains().join(", "));
                        println!("not before: {}", info.not_before);
                        println!("not after:  {}", info.not_after);
                    }
                    None => {
                        return Err(CliError::Generic(format!(
                            "No cached certificate for {} in `{}`",
                            config.domain,
                            config.cert_directory.display()
                        )));
                    }
                }
            }

            Commands::Version => {
                println!("wileedot {}", env!("CARGO_PKG_VERSION"));
            }
        }

        Ok(())
    }

    /// Load the config and initialize logging from it
    fn load_config(&self, path: &Path) -> Result<Config, CliError> {
        let config = Config::from_path(path);
        self.init_logger(config.as_ref().ok().and_then(|config| config.log_level));
        Ok(config?)
    }

    // NOTE: the command line flag always wins over the level in the configuration file
    fn init_logger(&self, configured: Option<LogLevel>) {
        let level = self.log_level.or(configured).unwrap_or_default();
        env_logger::Builder::new()
            .filter_level(level.into())
            .init();
    }
}

pub(crate) mod cli;
pub(crate) mod error;
pub(crate) mod server;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::new();

    if let Err(e) = cli.execute().await {
        log::error!("Error: {e}");
        std::process::exit(1);
    }
}

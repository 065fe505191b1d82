//! storefront-session CLI binary entry point.

use storefront_session::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    if let Err(e) = storefront_session::cli::session::run(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

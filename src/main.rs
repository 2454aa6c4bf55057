use clap::Parser;
use tracing_subscriber::EnvFilter;

use rust_banano::cli::{self, Cli};
use rust_banano::config::WalletConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = WalletConfig::load_or_default(&cli.config);

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.wallet.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(command) = cli.command else {
        println!("No command given. Run with --help for usage.");
        return;
    };

    if let Err(e) = cli::run(command, &config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

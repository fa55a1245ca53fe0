//! Stepwise CLI
//!
//! Runs JSON scripts in bounded slices, saving and resuming in-flight state.

use stepwise_core::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

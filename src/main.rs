use std::sync::Arc;

use tracing::{error, info};

use finpal::config::{load_config, print_schema};
use finpal::startup;
use finpal::utils::logger::init_logging;

const CONFIG_PATH: &str = "./config.yaml";

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--schema") {
        if let Err(e) = print_schema() {
            eprintln!("Failed to render configuration schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = load_config(CONFIG_PATH);
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        std::process::exit(1);
    }
    info!(
        environment = config.environment().as_str(),
        provider = config.provider.name(),
        "Configuration loaded"
    );

    if let Err(e) = startup::run(Arc::new(config)).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

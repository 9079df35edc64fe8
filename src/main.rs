use std::env;
use std::process;
use warden::{config::WardenConfig, init_server, init_tracing};

#[tokio::main]
async fn main() {
    // Initialize tracing
    init_tracing();

    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/warden.yaml".to_string());

    // Load configuration
    let config = match WardenConfig::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: warden [config_file]");
            process::exit(1);
        }
    };

    if let Err(e) = init_server(config).await {
        eprintln!("Warden error: {}", e);
        process::exit(1);
    }
}

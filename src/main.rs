use defect_dashboard::app;
use defect_dashboard::config::ServerConfig;
use log::{error, info};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let config = ServerConfig::from_env().with_args(&args);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Defect dashboard starting");

    // Start the web application
    if let Err(e) = app::run(config).await {
        error!("server error: {}", e);
        return Err(e);
    }

    Ok(())
}

use std::path::PathBuf;

use tripwire::config::loader::load_or_default;
use tripwire::lifecycle::startup;
use tripwire::observability::logging::init_logging;

const CONFIG_ENV: &str = "TRIPWIRE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "tripwire.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = load_or_default(&config_path)?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        breakers = config.breakers.len(),
        admin_enabled = config.admin.enabled,
        metrics_enabled = config.observability.metrics_enabled,
        "tripwire starting"
    );

    let watch_path = config_path.exists().then_some(config_path.as_path());
    let service = startup::start(config, watch_path).await?;
    service.run_until_signal().await;
    Ok(())
}

use tracing::{debug, error, info};

use rotating_jsonlog::init::{init_tracing_with_config, LayerConfig};
use rotating_jsonlog::{JsonLogger, LoggerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = JsonLogger::new(LoggerConfig::from_env()?)?;

    init_tracing_with_config(
        logger.clone(),
        LayerConfig {
            debug: false,
            enable_stdout: true,
        },
    )?;

    info!("starting service");
    debug!("not written, debug output is off");
    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    logger.close().await?;
    Ok(())
}

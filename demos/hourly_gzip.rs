use rotating_jsonlog::{record, JsonLogger, LoggerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rotates on every local hour into ./hourly_logs/YYYY-MM/YYYY-MM-DD/.
    let config = LoggerConfig::new("./hourly_logs")
        .with_hourly_rotation()
        .with_compression();
    let logger = JsonLogger::new(config)?;

    logger
        .submit(record! { "Time" => chrono::Utc::now().timestamp(), "Msg" => "service started" })
        .await?;
    logger
        .submit(record! { "user_id" => 42, "reason" => "invalid password" })
        .await?;

    println!("writing to {:?}", logger.first_path());
    logger.close().await?;
    Ok(())
}

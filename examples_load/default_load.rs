use std::time::Instant;

use rotating_jsonlog::{record, JsonLogger, LoggerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = JsonLogger::new(LoggerConfig::new("./load_logs"))?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        logger
            .submit(record! { "iteration" => i, "Msg" => "default load test" })
            .await?;
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.close().await?;
    println!("written: {:?}", logger.stats());
    Ok(())
}

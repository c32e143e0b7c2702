use std::time::Instant;
use tokio::time::Duration;

use rotating_jsonlog::{record, JsonLogger, LoggerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggerConfig::new("./load_logs")
        .with_queue_capacity(50_000)
        .with_write_buffer_size(1 << 20)
        .with_flush_interval(Duration::from_millis(200));
    let logger = JsonLogger::new(config)?;

    let producers: u64 = 8;
    let per_producer: u64 = 25_000;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for p in 0..producers {
        let logger = logger.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..per_producer {
                logger
                    .submit(record! { "producer" => p, "iteration" => i })
                    .await?;
            }
            Ok::<_, rotating_jsonlog::LoggerError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let n = producers * per_producer;
    let elapsed = start.elapsed();
    println!("custom config: sent {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.close().await?;
    Ok(())
}

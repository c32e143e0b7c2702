//! Environment variable names read by
//! [`LoggerConfig::from_env`](crate::config::LoggerConfig::from_env).
//!
//! These are purely helpers; the logger itself never touches the
//! environment.

/// Root directory for log files.
pub const JSONLOG_DIR_ENV: &str = "JSONLOG_DIR";

/// Switch mode, `day` or `hour`.
pub const JSONLOG_SWITCH_ENV: &str = "JSONLOG_SWITCH";

/// File extension, e.g. `log` or `.jsonl`.
pub const JSONLOG_EXT_ENV: &str = "JSONLOG_EXT";

/// `true` to gzip log files.
pub const JSONLOG_COMPRESS_ENV: &str = "JSONLOG_COMPRESS";

/// Flush interval in milliseconds.
pub const JSONLOG_FLUSH_MS_ENV: &str = "JSONLOG_FLUSH_MS";

/// Submission queue capacity.
pub const JSONLOG_QUEUE_CAPACITY_ENV: &str = "JSONLOG_QUEUE_CAPACITY";

/// Write buffer size in bytes.
pub const JSONLOG_BUFFER_SIZE_ENV: &str = "JSONLOG_BUFFER_SIZE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

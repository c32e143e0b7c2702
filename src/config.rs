use crate::env::{self, env_or};
use crate::switcher::{SwitchMode, UnknownSwitchMode};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of a [`JsonLogger`](crate::logger::JsonLogger).
///
/// **Fields**
/// - `base_dir`: root directory; dated subdirectories are created under it.
/// - `switch_mode`: rotate by local day or by local hour.
/// - `file_extension`: file suffix, the leading dot is added if missing.
/// - `compress`: gzip the whole file as one stream (adds `.gz`).
/// - `flush_interval`: period of the flush timer.
/// - `queue_capacity`: bound of the submission queue; a full queue makes
///   producers wait.
/// - `write_buffer_size`: size of the in-memory write buffer per file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    pub base_dir: PathBuf,
    pub switch_mode: SwitchMode,
    pub file_extension: String,
    pub compress: bool,
    pub flush_interval: Duration,
    pub queue_capacity: usize,
    pub write_buffer_size: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("logs"),
            switch_mode: SwitchMode::Day,
            file_extension: ".log".to_string(),
            compress: false,
            flush_interval: Duration::from_secs(2),
            queue_capacity: 2000,
            write_buffer_size: 4096,
        }
    }
}

/// Error type returned when a configuration is rejected.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("base directory must not be empty")]
    EmptyBaseDir,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error(transparent)]
    SwitchMode(#[from] UnknownSwitchMode),

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("compression requested but the `gzip` feature is disabled")]
    GzipDisabled,
}

impl LoggerConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_switch_mode(mut self, mode: SwitchMode) -> Self {
        self.switch_mode = mode;
        self
    }

    pub fn with_hourly_rotation(self) -> Self {
        self.with_switch_mode(SwitchMode::Hour)
    }

    pub fn with_daily_rotation(self) -> Self {
        self.with_switch_mode(SwitchMode::Day)
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = ext.into();
        self
    }

    pub fn with_compression(mut self) -> Self {
        self.compress = true;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Build a config from `JSONLOG_*` environment variables, falling back
    /// to [`LoggerConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let default_dir = d.base_dir.to_string_lossy().into_owned();

        let switch_mode: SwitchMode = env_or(env::JSONLOG_SWITCH_ENV, &d.switch_mode.to_string()).parse()?;
        let compress: bool = parse_env(env::JSONLOG_COMPRESS_ENV, &d.compress.to_string())?;
        let flush_ms: u64 = parse_env(
            env::JSONLOG_FLUSH_MS_ENV,
            &d.flush_interval.as_millis().to_string(),
        )?;

        Ok(Self {
            base_dir: PathBuf::from(env_or(env::JSONLOG_DIR_ENV, &default_dir)),
            switch_mode,
            file_extension: env_or(env::JSONLOG_EXT_ENV, &d.file_extension),
            compress,
            flush_interval: Duration::from_millis(flush_ms),
            queue_capacity: parse_env(
                env::JSONLOG_QUEUE_CAPACITY_ENV,
                &d.queue_capacity.to_string(),
            )?,
            write_buffer_size: parse_env(
                env::JSONLOG_BUFFER_SIZE_ENV,
                &d.write_buffer_size.to_string(),
            )?,
        })
    }

    /// Validate and canonicalize the config.
    ///
    /// The extension gets its leading dot and a `.gz` suffix when compressed.
    /// Minimal thresholds are enforced for the flush interval and buffer
    /// size to avoid degenerate configs.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBaseDir);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.compress && !cfg!(feature = "gzip") {
            return Err(ConfigError::GzipDisabled);
        }

        if !self.file_extension.is_empty() && !self.file_extension.starts_with('.') {
            self.file_extension.insert(0, '.');
        }
        if self.compress && !self.file_extension.ends_with(".gz") {
            self.file_extension.push_str(".gz");
        }

        self.flush_interval = self.flush_interval.max(Duration::from_millis(10));
        self.write_buffer_size = self.write_buffer_size.max(512);
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env_or(key, default);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

//! Opt-in process-wide logger.
//!
//! Nothing here is initialized implicitly: call [`init_global`] once at
//! startup and [`shutdown_global`] before exit. Code that can take a
//! [`JsonLogger`] handle explicitly should do that instead.

use crate::config::LoggerConfig;
use crate::logger::{JsonLogger, LoggerError};
use std::sync::RwLock;

static GLOBAL: RwLock<Option<JsonLogger>> = RwLock::new(None);

#[derive(thiserror::Error, Debug)]
pub enum GlobalError {
    #[error("global logger is already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Logger(#[from] LoggerError),
}

/// Create the process-wide logger. Fails if one is already installed.
pub fn init_global(config: LoggerConfig) -> Result<JsonLogger, GlobalError> {
    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
        return Err(GlobalError::AlreadyInitialized);
    }
    let logger = JsonLogger::new(config)?;
    *slot = Some(logger.clone());
    Ok(logger)
}

/// Handle to the process-wide logger, if one is installed.
pub fn global() -> Option<JsonLogger> {
    GLOBAL.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Uninstall the process-wide logger and close it. A no-op when none is
/// installed.
pub async fn shutdown_global() -> Result<(), LoggerError> {
    let logger = GLOBAL.write().unwrap_or_else(|e| e.into_inner()).take();
    match logger {
        Some(logger) => logger.close().await,
        None => Ok(()),
    }
}

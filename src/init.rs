use crate::layer::JsonLogLayer;
use crate::logger::JsonLogger;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Options for installing [`JsonLogLayer`] as the global subscriber.
///
/// **Fields**
/// - `debug`: if `false`, `debug!`/`trace!` events are not written.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is added
///   on top so events are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub debug: bool,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            debug: true,
            enable_stdout: false,
        }
    }
}

/// Install a global `tracing` subscriber that writes every event into
/// `logger`.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`JsonLogLayer`] as the
/// global default subscriber. Fails if a global subscriber was already set.
pub fn init_tracing_with_config(
    logger: JsonLogger,
    config: LayerConfig,
) -> Result<(), SetGlobalDefaultError> {
    let layer = JsonLogLayer::new(logger);
    layer.set_debug(config.debug);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Install the layer with [`LayerConfig::default`].
pub fn init_tracing(logger: JsonLogger) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(logger, LayerConfig::default())
}

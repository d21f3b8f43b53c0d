use crate::hook::TableHook;
use crate::layer::TableLayer;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the subscriber installed around [`TableLayer`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked next to the table layer so events are also printed to the
///   console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self { enable_stdout: true }
    }
}

/// Install a global `tracing` subscriber that writes accepted events
/// through `hook`.
///
/// **Parameters**
/// - `hook`: a [`TableHook`]; a disabled hook is accepted and simply
///   stores nothing.
/// - `config`: [`LayerConfig`] controlling the console layer.
///
/// **Errors**
///
/// Fails if a global default subscriber has already been set.
pub fn init_tracing_with_config(hook: TableHook, config: LayerConfig) -> Result<(), SetGlobalDefaultError> {
    let layer = TableLayer::new(hook);

    // Two subscriber shapes, since the layered types differ.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(hook: TableHook) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(hook, LayerConfig::default())
}

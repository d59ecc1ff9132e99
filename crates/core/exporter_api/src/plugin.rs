use async_trait::async_trait;

use crate::ExporterError;

/// A component of the exporter with a start/shutdown lifecycle
///
/// The binary starts every plugin once after configuration was loaded, and shuts every plugin
/// down once the process was asked to terminate. A plugin that spawns background work in
/// [`Plugin::start`] must have that work finished when [`Plugin::shutdown`] returns.
#[async_trait]
pub trait Plugin: Send {
    /// Name of the plugin, used in log output and error messages
    fn name(&self) -> &'static str;

    /// Start the plugin
    ///
    /// This should return as soon as the plugin is running. Long-running work belongs into a
    /// spawned task.
    async fn start(&mut self) -> Result<(), ExporterError>;

    /// Stop the plugin and wait for its background work to finish
    async fn shutdown(&mut self) -> Result<(), ExporterError>;
}

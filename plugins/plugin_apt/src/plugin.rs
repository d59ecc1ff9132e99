use async_trait::async_trait;
use exporter_api::error::LifecycleError;
use exporter_api::CancellationToken;
use exporter_api::ExporterError;
use exporter_api::GaugeSink;
use exporter_api::Plugin;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;

use crate::collector::Collector;
use crate::probe::ProbeRunner;

/// Runs a [`Collector`] in its own task
pub struct AptPlugin<P, S> {
    collector: Option<Collector<P, S>>,
    cancellation_token: CancellationToken,
    join_handle: Option<JoinHandle<Result<(), ExporterError>>>,
}

impl<P, S> AptPlugin<P, S> {
    /// The collector stops once `cancellation_token` is cancelled, or when the plugin is shut down
    pub fn new(collector: Collector<P, S>, cancellation_token: CancellationToken) -> Self {
        Self {
            collector: Some(collector),
            cancellation_token,
            join_handle: None,
        }
    }
}

#[async_trait]
impl<P, S> Plugin for AptPlugin<P, S>
where
    P: ProbeRunner + 'static,
    S: GaugeSink + 'static,
{
    fn name(&self) -> &'static str {
        "apt"
    }

    async fn start(&mut self) -> Result<(), ExporterError> {
        debug!("Setting up AptPlugin");
        let collector = self
            .collector
            .take()
            .ok_or(LifecycleError::AlreadyStarted("apt"))?;

        let mainloop = collector.start(self.cancellation_token.clone());
        self.join_handle = Some(tokio::spawn(mainloop));
        trace!("Mainloop spawned");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ExporterError> {
        debug!("Shutting down AptPlugin");
        self.cancellation_token.cancel();

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|e| LifecycleError::TaskJoinFailed("apt", e))??;
        }
        Ok(())
    }
}

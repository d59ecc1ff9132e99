use std::sync::Arc;

use exporter_api::CancellationToken;
use exporter_api::ExporterError;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::trace;

pub struct MainloopTick<State: Sized> {
    pub(super) state: State,
    pub(super) logging: bool,
    pub(super) cancellation: CancellationToken,
    pub(super) duration: std::time::Duration,
}

impl<State> MainloopTick<State>
where
    State: Sized,
{
    #[must_use]
    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// Run the mainloop until it is cancelled or `func` returns an error
    ///
    /// `func` is awaited to completion before the next tick is waited for, so two invocations
    /// never overlap. Ticks that were missed while `func` was running are not made up for.
    /// If cancellation and a tick are ready at the same time, cancellation wins.
    #[tracing::instrument(skip_all)]
    pub async fn run<Func, Fut>(self, func: Func) -> Result<(), ExporterError>
    where
        Func: Fn(Arc<State>) -> Fut,
        Fut: futures::future::Future<Output = Result<(), ExporterError>>,
    {
        debug!(
            "Building ticking mainloop with interval = {:?}",
            self.duration
        );
        let mut interval = tokio::time::interval(self.duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let state = Arc::new(self.state);
        loop {
            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => {
                    if self.logging {
                        trace!("stopping...");
                    }

                    break;
                }

                _tick = interval.tick() => {
                    if self.logging {
                        trace!("Tick");
                    }

                    match func(state.clone()).await {
                        Ok(_) if self.logging => debug!("Ok(_) from mainloop function"),
                        Err(e) => {
                            if self.logging {
                                error!("Error from mainloop function: {:?}", e);
                            }
                            return Err(e)
                        },
                        _ => {},
                    }

                    if self.logging {
                        trace!("func returned");
                    }
                },
            }
        }

        Ok(())
    }
}

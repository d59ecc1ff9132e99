use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use exporter_api::CancellationToken;
use exporter_api::ExporterError;
use exporter_api::GaugeSink;
use exporter_lib::mainloop::Mainloop;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::AptConfig;
use crate::probe::ProbeRunner;
use crate::sample::Check;
use crate::sample::SampleSet;

/// Names of all gauges written by a [`Collector`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaugeNames {
    pub updates_available: String,
    pub security_updates_available: String,
    pub seconds_since_last_update: String,
    pub reboot_required: String,
    pub collector_success: String,
    pub collector_duration_seconds: String,
    pub collector_last_timestamp: String,
}

impl GaugeNames {
    pub fn new(prefix: &str) -> Self {
        let name = |suffix: &str| format!("{}_{}", prefix, suffix);
        Self {
            updates_available: name(Check::UpdatesAvailable.as_str()),
            security_updates_available: name(Check::SecurityUpdatesAvailable.as_str()),
            seconds_since_last_update: name(Check::SecondsSinceLastUpdate.as_str()),
            reboot_required: name(Check::RebootRequired.as_str()),
            collector_success: name("collector_success"),
            collector_duration_seconds: name("collector_duration_seconds"),
            collector_last_timestamp: name("collector_last_timestamp"),
        }
    }

    pub fn for_check(&self, check: Check) -> &str {
        match check {
            Check::UpdatesAvailable => &self.updates_available,
            Check::SecurityUpdatesAvailable => &self.security_updates_available,
            Check::SecondsSinceLastUpdate => &self.seconds_since_last_update,
            Check::RebootRequired => &self.reboot_required,
        }
    }

    /// Every gauge name with its help text
    pub fn descriptions(&self) -> Vec<(&str, &'static str)> {
        let mut descriptions = Check::ALL
            .into_iter()
            .map(|check| (self.for_check(check), check.help()))
            .collect::<Vec<_>>();

        descriptions.extend([
            (
                self.collector_success.as_str(),
                "1 if the last collection was successful, 0 otherwise",
            ),
            (
                self.collector_duration_seconds.as_str(),
                "Duration of the last collection in seconds",
            ),
            (
                self.collector_last_timestamp.as_str(),
                "Timestamp of the last collection",
            ),
        ]);
        descriptions
    }
}

/// Summary of one collection pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    /// Whether every check of the pass succeeded
    pub success: bool,
    pub duration: Duration,
    pub completed_at: SystemTime,
}

impl CycleReport {
    fn project<S: GaugeSink>(&self, sink: &S, names: &GaugeNames) {
        let timestamp = self
            .completed_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as f64)
            .unwrap_or(0.0);

        sink.set_gauge(&names.collector_success, if self.success { 1.0 } else { 0.0 });
        sink.set_gauge(
            &names.collector_duration_seconds,
            self.duration.as_secs_f64(),
        );
        sink.set_gauge(&names.collector_last_timestamp, timestamp);
    }
}

/// Periodically runs a [`SampleSet`] and writes the results into a [`GaugeSink`]
///
/// A collector is idle until [`Collector::start`] is called, which consumes it. From then on it
/// runs until the passed cancellation token fires.
pub struct Collector<P, S> {
    samples: SampleSet<P>,
    sink: S,
    names: GaugeNames,
    interval: Duration,
}

impl<P, S> Collector<P, S>
where
    P: ProbeRunner,
    S: GaugeSink,
{
    pub fn new(config: &AptConfig, probes: P, sink: S) -> Self {
        Self {
            samples: SampleSet::new(config, probes),
            sink,
            names: GaugeNames::new(&config.metric_prefix),
            interval: config.interval(),
        }
    }

    pub fn names(&self) -> &GaugeNames {
        &self.names
    }

    /// Run one collection pass and write all gauges
    #[tracing::instrument(skip_all)]
    pub async fn collect(&self) -> CycleReport {
        debug!("Collecting apt metrics");
        let started = std::time::Instant::now();

        let sample = self.samples.sample().await;
        for (check, result) in sample.iter() {
            if let Err(e) = result {
                warn!(check = %check, error = %e, "Check failed");
            }
            self.sink
                .set_gauge(self.names.for_check(check), sample.value_or_default(check));
        }

        let report = CycleReport {
            success: sample.is_success(),
            duration: started.elapsed(),
            completed_at: SystemTime::now(),
        };
        report.project(&self.sink, &self.names);

        info!(
            success = report.success,
            duration = ?report.duration,
            "Collection finished"
        );
        report
    }
}

impl<P, S> Collector<P, S>
where
    P: ProbeRunner + 'static,
    S: GaugeSink + 'static,
{
    /// Collect right away, then once every interval, until `cancellation` fires
    ///
    /// Passes never overlap. Cancellation is noticed between passes, a running pass is finished
    /// first, which takes at most the command timeout.
    pub async fn start(self, cancellation: CancellationToken) -> Result<(), ExporterError> {
        let interval = self.interval;
        info!("Starting collection every {:?}", interval);

        Mainloop::ticking_every(interval, self, cancellation)
            .with_logging(true)
            .run(main_collect)
            .await?;

        info!("Stopping metrics collection");
        Ok(())
    }
}

async fn main_collect<P, S>(collector: Arc<Collector<P, S>>) -> Result<(), ExporterError>
where
    P: ProbeRunner,
    S: GaugeSink,
{
    collector.collect().await;
    Ok(())
}

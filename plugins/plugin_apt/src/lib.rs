//! Collection of apt package-management state
//!
//! A [`Collector`] periodically samples the host through a [`ProbeRunner`]: the number of pending
//! updates and security updates as reported by the update-check tool, the time since the last
//! successful update, and whether a reboot is pending. Every pass writes its results as gauges
//! into a [`GaugeSink`](exporter_api::GaugeSink).

mod collector;
mod config;
mod error;
mod plugin;
mod probe;
mod sample;

pub use crate::collector::Collector;
pub use crate::collector::CycleReport;
pub use crate::collector::GaugeNames;
pub use crate::config::AptConfig;
pub use crate::error::Error;
pub use crate::error::ProbeError;
pub use crate::plugin::AptPlugin;
pub use crate::probe::CommandOutput;
pub use crate::probe::PathState;
pub use crate::probe::ProbeRunner;
pub use crate::probe::SystemProbeRunner;
pub use crate::sample::parse_update_counts;
pub use crate::sample::Check;
pub use crate::sample::Sample;
pub use crate::sample::SampleResult;
pub use crate::sample::SampleSet;

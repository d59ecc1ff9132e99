//! Prometheus backend for gauges
//!
//! [`PrometheusSink`] keeps every gauge in a registry owned by the process, and
//! [`PrometheusPlugin`] serves that registry over HTTP in the Prometheus text format.

mod error;
mod plugin;
mod sink;

pub use crate::error::Error;
pub use crate::plugin::PrometheusPlugin;
pub use crate::sink::PrometheusSink;

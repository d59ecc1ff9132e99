use std::collections::HashMap;
use std::sync::PoisonError;
use std::sync::RwLock;

use exporter_api::GaugeSink;
use prometheus::Encoder;
use prometheus::Gauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::debug;
use tracing::warn;

use crate::error::Error;

/// A [`GaugeSink`] backed by a Prometheus [`Registry`]
///
/// Gauges should be registered with their help text up front. A gauge written without being
/// registered first is registered on the fly, with its name as help text.
pub struct PrometheusSink {
    registry: Registry,
    gauges: RwLock<HashMap<String, Gauge>>,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// Register a gauge named `name`
    ///
    /// Registering a name twice is a no-op, the first help text is kept.
    pub fn register(&self, name: &str, help: &str) -> Result<(), Error> {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        if gauges.contains_key(name) {
            return Ok(());
        }

        let registration_error = |source| Error::Registration {
            name: name.to_string(),
            source,
        };
        let gauge = Gauge::with_opts(Opts::new(name, help)).map_err(registration_error)?;
        self.registry
            .register(Box::new(gauge.clone()))
            .map_err(registration_error)?;

        debug!(%name, "Registered gauge");
        gauges.insert(name.to_string(), gauge);
        Ok(())
    }

    /// Render all gauges in the Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(Error::Encode)?;
        Ok(buffer)
    }

    /// The content type of [`PrometheusSink::encode`] output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PrometheusSink")
            .field("gauges", &gauges.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GaugeSink for PrometheusSink {
    fn set_gauge(&self, name: &str, value: f64) {
        if let Some(gauge) = self
            .gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            gauge.set(value);
            return;
        }

        if let Err(e) = self.register(name, name) {
            warn!(%name, error = %e, "Dropping value of gauge that cannot be registered");
            return;
        }

        if let Some(gauge) = self
            .gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            gauge.set(value);
        }
    }
}

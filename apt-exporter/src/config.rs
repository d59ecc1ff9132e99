use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use exporter_lib::config::Humantime;
use exporter_lib::config::ListenAddress;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Yaml;
use figment::Figment;
use plugin_apt::AptConfig;

/// Prefix of environment variables that override configuration keys
pub const ENV_PREFIX: &str = "APT_EXPORTER_";

#[derive(Debug, miette::Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("Failed to read configuration file '{}'", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration")]
    Parse(#[source] Box<figment::Error>),

    #[error("Metrics endpoint must not be empty")]
    EmptyMetricsEndpoint,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Apt(#[from] plugin_apt::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Configuration of the whole exporter
///
/// The apt collector keys live at the top level next to the server keys.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct Configuration {
    #[serde(flatten)]
    pub apt: AptConfig,

    /// Address the metrics server binds to, `":port"` binds to all IPv4 interfaces
    ///
    /// default: ":9100"
    #[serde(default = "listen_address_default")]
    pub listen_address: ListenAddress,

    /// Path the metrics are served on
    ///
    /// default: "/metrics"
    #[serde(default = "metrics_endpoint_default")]
    pub metrics_endpoint: String,

    /// default: "info"
    #[serde(default = "log_level_default")]
    pub log_level: LogLevel,

    /// How long in-flight scrapes may take to finish on shutdown
    ///
    /// default: "5s"
    #[serde(default = "shutdown_grace_period_default")]
    pub shutdown_grace_period: Humantime,
}

fn listen_address_default() -> ListenAddress {
    ListenAddress::from(SocketAddr::from(([0, 0, 0, 0], 9100)))
}

fn metrics_endpoint_default() -> String {
    "/metrics".to_string()
}

fn log_level_default() -> LogLevel {
    LogLevel::Info
}

fn shutdown_grace_period_default() -> Humantime {
    Humantime::from(Duration::from_secs(5))
}

impl Configuration {
    /// Read the YAML file at `path`, apply environment overrides and validate the result
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, Error> {
        let mut config = Figment::new()
            .merge(Yaml::string(content))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract::<Configuration>()
            .map_err(|e| Error::Parse(Box::new(e)))?;

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        let endpoint = self.metrics_endpoint.trim();
        self.metrics_endpoint = if endpoint.is_empty() || endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.metrics_endpoint.is_empty() {
            return Err(Error::EmptyMetricsEndpoint);
        }

        self.apt.validate().map_err(Error::from)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        self.shutdown_grace_period.into_duration()
    }
}

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

use crate::cli::LoggingSpec;
use crate::config::LogLevel;

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

fn cli_level(spec: LoggingSpec) -> LevelFilter {
    match spec {
        LoggingSpec::Off => LevelFilter::OFF,
        LoggingSpec::Trace => LevelFilter::TRACE,
        LoggingSpec::Debug => LevelFilter::DEBUG,
        LoggingSpec::Info => LevelFilter::INFO,
        LoggingSpec::Warn => LevelFilter::WARN,
        LoggingSpec::Error => LevelFilter::ERROR,
    }
}

/// Install the global subscriber
///
/// Without `spec`, `configured` is the default level and `RUST_LOG` directives apply on top.
/// A level from `spec` overrides the default level of `RUST_LOG` as well.
pub(crate) fn setup_logging(spec: Option<LoggingSpec>, configured: LogLevel) -> miette::Result<()> {
    let env_filter = match spec {
        None => {
            let filter = EnvFilter::builder()
                .with_default_directive(LevelFilter::from(configured).into())
                .from_env_lossy();
            Some(filter)
        }

        Some(LoggingSpec::Off) => None,

        Some(spec) => {
            let filter = EnvFilter::from_default_env().add_directive(cli_level(spec).into());
            Some(filter)
        }
    };

    let stdout_log =
        env_filter.map(|env_filter| tracing_subscriber::fmt::layer().with_filter(env_filter));

    let subscriber = tracing_subscriber::registry::Registry::default().with(stdout_log);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| miette::miette!("Failed to set global subscriber: {:?}", e))?;

    Ok(())
}

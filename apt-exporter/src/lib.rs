#![doc = include_str!("../README.md")]

use std::sync::Arc;

use exporter_api::CancellationToken;
use exporter_api::ExporterError;
use exporter_api::Plugin;
use plugin_apt::AptPlugin;
use plugin_apt::Collector;
use plugin_apt::SystemProbeRunner;
use plugin_prometheus::PrometheusPlugin;
use plugin_prometheus::PrometheusSink;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::Configuration;

pub mod cli;
pub mod config;
mod logging;

pub async fn run_app(args: crate::cli::Cli) -> miette::Result<()> {
    match args.command {
        cli::CliCommand::Run {
            config,
            skip_path_validation,
        } => {
            let configuration = Configuration::load(&config).await?;
            crate::logging::setup_logging(args.logging, configuration.log_level)?;
            info!("Configuration loaded from {}", config.display());
            debug!("Configuration: {:?}", configuration);

            if skip_path_validation {
                debug!("Skipping path validation");
            } else {
                for problem in configuration.apt.validate_paths() {
                    warn!("{}", problem);
                }
            }

            run(configuration).await
        }
        cli::CliCommand::ValidateConfig { config } => {
            let configuration = Configuration::load(&config).await?;
            crate::logging::setup_logging(args.logging, configuration.log_level)?;
            info!("Configuration validated");
            Ok(())
        }
    }
}

fn into_report(e: ExporterError) -> miette::Report {
    miette::miette!(e)
}

async fn run(configuration: Configuration) -> miette::Result<()> {
    info!("Booting app now.");
    let cancellation_token = CancellationToken::new();

    let sink = Arc::new(PrometheusSink::new());
    let collector = Collector::new(&configuration.apt, SystemProbeRunner, sink.clone());
    for (name, help) in collector.names().descriptions() {
        sink.register(name, help)?;
    }

    let bind = configuration.listen_address.resolve().await?;
    let http = PrometheusPlugin::new(
        sink,
        bind,
        &configuration.metrics_endpoint,
        cancellation_token.child_token(),
    )
    .with_grace_period(configuration.shutdown_grace_period());
    let apt = AptPlugin::new(collector, cancellation_token.child_token());

    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => info!("Shutting down..."),
            Err(e) => error!("Cannot wait for shutdown signals, shutting down: {:?}", e),
        }
        signal_token.cancel();
    });

    let kill_signal = async {
        // Only polled once shutdown started, so this is the second interrupt
        let _ = tokio::signal::ctrl_c().await;
    };

    // Started in this order, shut down in reverse
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(http), Box::new(apt)];
    let res = run_plugins(plugins, cancellation_token, kill_signal).await;

    info!("Bye");
    res
}

/// Start `plugins` in order, run until `cancellation_token` fires, then shut them down in reverse
///
/// If a plugin fails to start, the plugins started before it are shut down right away.
/// Shutting down is abandoned once `kill_signal` completes.
pub async fn run_plugins<K>(
    mut plugins: Vec<Box<dyn Plugin>>,
    cancellation_token: CancellationToken,
    kill_signal: K,
) -> miette::Result<()>
where
    K: std::future::Future<Output = ()>,
{
    let mut started = 0;
    let mut start_result = Ok(());
    for plugin in plugins.iter_mut() {
        debug!("Starting plugin '{}'", plugin.name());
        if let Err(e) = plugin.start().await {
            error!("Failed to start plugin '{}'", plugin.name());
            start_result = Err(e);
            break;
        }
        started += 1;
    }

    if start_result.is_ok() {
        info!("Running");
        cancellation_token.cancelled().await;
    }
    cancellation_token.cancel();

    let shutdown_result = tokio::select! {
        res = shutdown_plugins(&mut plugins[..started]) => res,
        _ = kill_signal => {
            error!("Killing application");
            miette::bail!("Application killed")
        }
    };

    start_result.map_err(into_report)?;
    shutdown_result.map_err(into_report)
}

async fn shutdown_plugins(plugins: &mut [Box<dyn Plugin>]) -> Result<(), ExporterError> {
    let mut result = Ok(());
    for plugin in plugins.iter_mut().rev() {
        debug!("Shutting down plugin '{}'", plugin.name());
        if let Err(e) = plugin.shutdown().await {
            error!("Plugin '{}' failed to shut down: {}", plugin.name(), e);
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> miette::Result<()> {
    use miette::IntoDiagnostic;
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let mut terminate = signal(SignalKind::terminate()).into_diagnostic()?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.into_diagnostic()?,
        _ = terminate.recv() => debug!("Received SIGTERM"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> miette::Result<()> {
    use miette::IntoDiagnostic;

    tokio::signal::ctrl_c().await.into_diagnostic()
}

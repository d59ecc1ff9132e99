use miette::Diagnostic;
use thiserror::Error;

/// Errors as originating from a [`Plugin`](crate::Plugin)
pub type ExporterError = Box<dyn Diagnostic + Send + Sync + 'static>;

#[derive(Error, Debug, Diagnostic)]
/// An error occurred while driving the lifecycle of a [`Plugin`](crate::Plugin)
pub enum LifecycleError {
    /// `start()` was called on a plugin that is already running
    #[error("Plugin '{}' was already started", .0)]
    AlreadyStarted(&'static str),

    /// The task driving the plugin did not terminate cleanly
    #[error("Task of plugin '{}' failed to join", .0)]
    #[diagnostic(help("The task most likely panicked, check the log output above"))]
    TaskJoinFailed(&'static str, #[source] tokio::task::JoinError),
}

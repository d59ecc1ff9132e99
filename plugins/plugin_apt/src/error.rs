use std::path::PathBuf;

#[derive(Debug, miette::Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("Metric prefix must not be empty")]
    EmptyMetricPrefix,

    #[error("Metric prefix '{0}' is not a valid metric name")]
    #[diagnostic(help("Only ASCII letters, digits, '_' and ':' are allowed, and it must not start with a digit"))]
    InvalidMetricPrefix(String),

    #[error("Configured {0} must not be empty")]
    EmptyPath(&'static str),

    #[error("Configured {what} '{}' is not accessible", .path.display())]
    PathNotAccessible {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single probe or check did not yield a value
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
pub enum ProbeError {
    #[error("'{}' does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("'{}' did not finish within {timeout:?}", .path.display())]
    Timeout {
        path: PathBuf,
        timeout: std::time::Duration,
    },

    #[error("Failed to execute '{}'", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' exited with {status}, output: {output:?}", .path.display())]
    Exit {
        path: PathBuf,
        status: std::process::ExitStatus,
        output: String,
    },

    #[error("Unexpected output format, expected '<int>;<int>', got {output:?}")]
    Format { output: String },

    #[error("Failed to parse {field} count from {value:?}")]
    Parse {
        field: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Failed to inspect '{}'", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

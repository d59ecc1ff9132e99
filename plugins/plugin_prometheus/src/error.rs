use std::net::SocketAddr;

#[derive(Debug, miette::Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("Failed to register gauge '{name}'")]
    Registration {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("Failed to encode metrics")]
    Encode(#[source] prometheus::Error),

    #[error("Failed to bind HTTP server to {addr}")]
    #[diagnostic(help("Is another process already listening on this address?"))]
    Bind {
        addr: SocketAddr,
        #[source]
        source: hyper::Error,
    },

    #[error("HTTP server failed")]
    Server(#[source] hyper::Error),

    #[error("HTTP server did not shut down within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

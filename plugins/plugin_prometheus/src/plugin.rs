use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use exporter_api::error::LifecycleError;
use exporter_api::CancellationToken;
use exporter_api::ExporterError;
use exporter_api::Plugin;
use hyper::header::CONTENT_TYPE;
use hyper::Body;
use hyper::Method;
use hyper::Request;
use hyper::Response;
use hyper::Server;
use hyper::StatusCode;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::error::Error;
use crate::sink::PrometheusSink;

/// Serves a [`PrometheusSink`] over HTTP
pub struct PrometheusPlugin {
    sink: Arc<PrometheusSink>,
    bind: SocketAddr,
    endpoint: Arc<str>,
    grace_period: Duration,
    cancellation_token: CancellationToken,

    local_addr: Option<SocketAddr>,
    join_handle: Option<JoinHandle<Result<(), hyper::Error>>>,
}

impl PrometheusPlugin {
    pub fn new(
        sink: Arc<PrometheusSink>,
        bind: SocketAddr,
        endpoint: &str,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            sink,
            bind,
            endpoint: Arc::from(endpoint),
            grace_period: Duration::from_secs(5),
            cancellation_token,
            local_addr: None,
            join_handle: None,
        }
    }

    /// How long in-flight requests may take to finish on shutdown
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// The address the server actually listens on, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Plugin for PrometheusPlugin {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    async fn start(&mut self) -> Result<(), ExporterError> {
        debug!("Setting up PrometheusPlugin");
        if self.join_handle.is_some() {
            return Err(LifecycleError::AlreadyStarted("prometheus").into());
        }

        let sink = self.sink.clone();
        let endpoint = self.endpoint.clone();
        let svc = hyper::service::make_service_fn(move |_conn| {
            let sink = sink.clone();
            let endpoint = endpoint.clone();
            let service = hyper::service::service_fn(move |req| {
                request_handler(sink.clone(), endpoint.clone(), req)
            });

            async move { Ok::<_, Infallible>(service) }
        });

        let server = Server::try_bind(&self.bind)
            .map_err(|source| Error::Bind {
                addr: self.bind,
                source,
            })?
            .serve(svc);
        let local_addr = server.local_addr();

        let cancellation_token = self.cancellation_token.clone();
        let server = server.with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
        });

        info!("Serving metrics on http://{}{}", local_addr, self.endpoint);
        self.local_addr = Some(local_addr);
        self.join_handle = Some(tokio::spawn(server));
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ExporterError> {
        debug!("Shutting down PrometheusPlugin");
        self.cancellation_token.cancel();

        let Some(mut join_handle) = self.join_handle.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.grace_period, &mut join_handle).await {
            Ok(joined) => {
                joined
                    .map_err(|e| LifecycleError::TaskJoinFailed("prometheus", e))?
                    .map_err(Error::Server)?;
                trace!("HTTP server stopped");
                Ok(())
            }
            Err(_elapsed) => {
                warn!("HTTP server did not drain in time, aborting");
                join_handle.abort();
                Err(Error::ShutdownTimeout(self.grace_period).into())
            }
        }
    }
}

async fn request_handler(
    sink: Arc<PrometheusSink>,
    endpoint: Arc<str>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    trace!(method = %req.method(), path = %req.uri().path(), "Received request");

    if req.uri().path() != &*endpoint {
        return Ok(status(StatusCode::NOT_FOUND));
    }

    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(status(StatusCode::METHOD_NOT_ALLOWED));
    }

    match sink.encode() {
        Ok(buffer) => Ok(Response::builder()
            .header(CONTENT_TYPE, sink.content_type())
            .body(Body::from(buffer))
            .unwrap_or_else(|_| status(StatusCode::INTERNAL_SERVER_ERROR))),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            Ok(status(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn status(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(
        code.canonical_reason().unwrap_or_default().to_string(),
    ));
    *response.status_mut() = code;
    response
}

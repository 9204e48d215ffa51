//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Wrap the application Router in middleware (tracing, request ID, limits)
//! - Bind the listener (`start`) and run the accept loop
//! - Serve HTTP/1.1 and HTTP/2 per connection via hyper-util
//! - Drain connections on `stop`, forcing stragglers closed after the grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::ConnectInfo, middleware, Router};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::{
    add_extension::AddExtension,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::{AppContext, Application};
use crate::config::ServiceConfig;
use crate::health::HealthState;
use crate::http::request::{request_span, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::listener::is_transient_accept_error;
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::security;

/// Pause after a transient accept error (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type ConnectionService = TowerToHyperService<AddExtension<Router, ConnectInfo<SocketAddr>>>;

/// Errors that end a running server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("accept loop failed: {0}")]
    Accept(#[source] ListenerError),
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of draining connections at stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Connections that finished within the grace period.
    pub drained: usize,
    /// Connections still open at the deadline and aborted.
    pub forced: usize,
}

#[derive(Debug, Clone, Copy)]
struct ServeSettings {
    grace_period: Duration,
    header_read_timeout: Duration,
}

/// HTTP server for one application.
///
/// Each call to [`HttpServer::start`] binds its own listener with fresh
/// health state, so a stopped instance can be replaced on the same port.
pub struct HttpServer {
    app: Arc<dyn Application>,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server for `app` with the given configuration.
    pub fn new(app: Arc<dyn Application>, config: ServiceConfig) -> Self {
        Self { app, config }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Build the application Router with all middleware layers.
    pub fn build_router(&self, health: &HealthState) -> Router {
        let ctx = AppContext::new(health.clone(), self.config.app.title.clone());
        let router = self
            .app
            .router(&ctx)
            .layer(middleware::from_fn(metrics::track_requests));
        let router = security::headers::apply(router);
        let router = security::limits::apply(router, &self.config.limits);
        Self::with_request_layers(router, Duration::from_secs(self.config.timeouts.request_secs))
    }

    #[allow(deprecated)]
    fn with_request_layers(router: Router, request_timeout: Duration) -> Router {
        router
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Start using the host/port from the configuration.
    pub async fn start_configured(&self) -> Result<ServerHandle, ListenerError> {
        let listener = &self.config.listener;
        self.start(&listener.host, listener.port).await
    }

    /// Bind `host:port` and begin accepting connections.
    ///
    /// Fails if the address is in use, not permitted, or does not resolve.
    /// On success the accept loop runs in the background until
    /// [`ServerHandle::stop`] is called.
    pub async fn start(&self, host: &str, port: u16) -> Result<ServerHandle, ListenerError> {
        let listener = Listener::bind(host, port, self.config.listener.max_connections).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;

        let health = HealthState::new();
        let router = self.build_router(&health);
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let (done_tx, done_rx) = watch::channel(());
        let settings = ServeSettings {
            grace_period: Duration::from_secs(self.config.shutdown.grace_period_secs),
            header_read_timeout: Duration::from_secs(self.config.timeouts.header_read_secs),
        };

        let task = tokio::spawn(serve(
            listener,
            router,
            shutdown.clone(),
            tracker.clone(),
            settings,
            done_tx,
        ));

        tracing::info!(address = %local_addr, "HTTP server started");

        Ok(ServerHandle {
            local_addr,
            health,
            shutdown,
            tracker,
            done: done_rx,
            task,
        })
    }
}

/// Handle to a running server.
///
/// Dropping the handle leaves the server running; call [`ServerHandle::stop`]
/// to close it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    health: HealthState,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    done: watch::Receiver<()>,
    task: JoinHandle<Result<StopReport, ServeError>>,
}

impl ServerHandle {
    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Resolve when the server has ended on its own (fatal accept error) or after stop.
    pub async fn wait(&self) {
        let mut done = self.done.clone();
        // Nothing is ever sent; the sender dropping marks the end of the task.
        while done.changed().await.is_ok() {}
    }

    /// Close the listener and drain in-flight connections.
    ///
    /// Readiness flips to draining immediately. Connections still open after
    /// the grace period are aborted and counted in [`StopReport::forced`].
    pub async fn stop(self) -> Result<StopReport, ServeError> {
        self.health.begin_draining();
        self.shutdown.trigger();
        tracing::info!(address = %self.local_addr, "Stopping HTTP server");

        let report = self.task.await??;
        tracing::info!(
            drained = report.drained,
            forced = report.forced,
            "HTTP server stopped"
        );
        Ok(report)
    }
}

/// Accept loop. Owns the listener, so returning closes the socket.
async fn serve(
    listener: Listener,
    router: Router,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    settings: ServeSettings,
    _done: watch::Sender<()>,
) -> Result<StopReport, ServeError> {
    let builder = Arc::new(connection_builder(&settings));
    let mut stop = shutdown.subscribe();
    let mut connections = JoinSet::new();
    let mut fatal = None;

    loop {
        tokio::select! {
            biased;

            _ = stop.recv() => break,

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Connection task panicked");
                    }
                }
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = tracker.track();
                    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, "Serving connection");
                    let service = TowerToHyperService::new(AddExtension::new(
                        router.clone(),
                        ConnectInfo(peer),
                    ));
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        service,
                        Arc::clone(&builder),
                        shutdown.subscribe(),
                        guard,
                        permit,
                    ));
                }
                Err(ListenerError::Accept(e)) if is_transient_accept_error(&e) => {
                    tracing::warn!(error = %e, "Transient accept error");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept loop failed");
                    fatal = Some(e);
                    break;
                }
            }
        }
    }

    // Stop accepting before anything else so new clients are refused.
    drop(listener);
    tracing::info!("Listener closed");

    // Connections watch the same coordinator; a fatal exit drains them too.
    shutdown.trigger();
    let report = drain(&mut connections, settings.grace_period).await;

    match fatal {
        Some(e) => Err(ServeError::Accept(e)),
        None => Ok(report),
    }
}

fn connection_builder(settings: &ServeSettings) -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(settings.header_read_timeout);
    builder
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: ConnectionService,
    builder: Arc<auto::Builder<TokioExecutor>>,
    mut stop: ShutdownSignal,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.recv() => {
            tracing::debug!(connection_id = %guard.id(), "Draining connection");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, error = %e, "Connection error");
    }
}

/// Wait for connection tasks up to `grace`, then abort the rest.
async fn drain(connections: &mut JoinSet<()>, grace: Duration) -> StopReport {
    let in_flight = connections.len();
    if in_flight == 0 {
        return StopReport::default();
    }

    tracing::info!(in_flight, grace_period = ?grace, "Draining connections");

    let drained_in_time = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await
    .is_ok();

    let forced = if drained_in_time {
        0
    } else {
        let remaining = connections.len();
        tracing::warn!(remaining, "Grace period elapsed, forcing connections closed");
        connections.shutdown().await;
        metrics::record_forced_closes(remaining);
        remaining
    };

    StopReport {
        drained: in_flight - forced,
        forced,
    }
}

//! Startup orchestration.
//!
//! # Order
//! 1. Resolve the application target (fail before touching the network)
//! 2. Start the metrics exporter, if enabled
//! 3. Bind the listener and begin accepting traffic
//! 4. Wait for a termination signal, then stop and drain
//!
//! Any startup error is fatal; there is no retry.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use crate::app::{AppRef, AppRefError, AppRegistry, AppResolveError};
use crate::config::{ConfigError, ServiceConfig};
use crate::http::server::{HttpServer, ServeError, StopReport};
use crate::net::ListenerError;
use crate::observability::metrics;

/// Everything that can keep the service from running to a clean exit.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid application target: {0}")]
    AppRef(#[from] AppRefError),
    #[error("error loading application: {0}")]
    AppResolve(#[from] AppResolveError),
    #[error("metrics exporter failed: {0}")]
    Metrics(String),
    #[error("bind failure: {0}")]
    Bind(#[from] ListenerError),
    #[error("signal handling failed: {0}")]
    Signal(#[source] std::io::Error),
    #[error("server failed: {0}")]
    Serve(#[from] ServeError),
}

impl StartupError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            StartupError::Bind(_) => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }
}

/// Resolve, bind, serve until `shutdown` resolves, then drain.
pub async fn run<F>(
    config: ServiceConfig,
    registry: &AppRegistry,
    shutdown: F,
) -> Result<StopReport, StartupError>
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    let target: AppRef = config.app.target.parse()?;
    let app = registry.resolve(&target)?;
    tracing::info!(app = %target, "Application loaded");

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("{e}")))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let server = HttpServer::new(Arc::clone(&app), config);
    let handle = server.start_configured().await?;
    tracing::info!(
        address = %handle.local_addr(),
        "Accepting connections"
    );

    tokio::select! {
        signal = shutdown => {
            if let Err(e) = signal {
                let _ = handle.stop().await;
                return Err(StartupError::Signal(e));
            }
        }
        _ = handle.wait() => {
            tracing::warn!("Server ended without a stop request");
        }
    }

    Ok(handle.stop().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = 0;
        config
    }

    #[tokio::test]
    async fn unknown_app_fails_before_binding() {
        let mut config = local_config();
        config.app.target = "server:app".into();

        let err = run(config, &AppRegistry::with_builtin(), async { Ok("test") })
            .await
            .unwrap_err();
        assert!(matches!(err, StartupError::AppResolve(AppResolveError::ModuleNotFound(_))));
        assert_eq!(err.exit_code(), ExitCode::from(1));
    }

    #[tokio::test]
    async fn bind_failure_exits_with_two() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = local_config();
        config.listener.port = taken.local_addr().unwrap().port();

        let err = run(config, &AppRegistry::with_builtin(), async { Ok("test") })
            .await
            .unwrap_err();
        assert!(matches!(err, StartupError::Bind(_)));
        assert_eq!(err.exit_code(), ExitCode::from(2));
    }

    #[tokio::test]
    async fn runs_until_shutdown_future_resolves() {
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("test")
        };
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            run(local_config(), &AppRegistry::with_builtin(), shutdown),
        )
        .await
        .expect("run should return after shutdown")
        .unwrap();
        assert_eq!(report, StopReport::default());
    }

    #[tokio::test]
    async fn signal_errors_still_stop_the_server() {
        let shutdown = async { Err(std::io::Error::other("no signals here")) };
        let err = run(local_config(), &AppRegistry::with_builtin(), shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, StartupError::Signal(_)));
    }
}

//! OS signal handling.
//!
//! SIGTERM and SIGINT (Ctrl-C elsewhere) both request a graceful stop.

/// Wait for the first termination signal and return its name.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    tracing::info!(signal = name, "Shutdown signal received");
    Ok(name)
}

/// Wait for the first termination signal and return its name.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "Shutdown signal received");
    Ok("ctrl-c")
}

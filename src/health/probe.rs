//! HTTP health probe used by the `bootstrap-probe` binary.

use std::process::ExitCode;
use std::time::Duration;

use reqwest::StatusCode;

/// Result of one probe request.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The endpoint answered with a 2xx status.
    Healthy(StatusCode),
    /// The endpoint answered with anything else.
    Unhealthy(StatusCode),
    /// No response: refused, timed out, or not HTTP.
    Unreachable(reqwest::Error),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy(_))
    }

    /// `0` when healthy, `1` otherwise.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_healthy() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn probe_target(url: &str, path: &str) -> String {
    format!("{}/{}", url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// GET `target` once with the given timeout.
pub async fn probe(target: &str, timeout: Duration) -> ProbeOutcome {
    let client = match reqwest::Client::builder().timeout(timeout).no_proxy().build() {
        Ok(client) => client,
        Err(e) => return ProbeOutcome::Unreachable(e),
    };

    match client.get(target).send().await {
        Ok(res) if res.status().is_success() => ProbeOutcome::Healthy(res.status()),
        Ok(res) => ProbeOutcome::Unhealthy(res.status()),
        Err(e) => ProbeOutcome::Unreachable(e),
    }
}

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use service_bootstrap::health::probe::{probe, probe_target, ProbeOutcome};

#[derive(Parser)]
#[command(name = "bootstrap-probe")]
#[command(about = "Health probe for service-bootstrap (container HEALTHCHECK)", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[arg(short, long, default_value = "/healthz")]
    path: String,

    #[arg(short, long, default_value_t = 3)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let target = probe_target(&cli.url, &cli.path);

    let outcome = probe(&target, Duration::from_secs(cli.timeout_secs)).await;
    match &outcome {
        ProbeOutcome::Healthy(status) => println!("{target}: {status}"),
        ProbeOutcome::Unhealthy(status) => eprintln!("{target}: {status}"),
        ProbeOutcome::Unreachable(e) => eprintln!("{target}: {e}"),
    }
    outcome.exit_code()
}

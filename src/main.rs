use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use service_bootstrap::app::AppRegistry;
use service_bootstrap::config::{self, ConfigError, LogFormat, ServiceConfig};
use service_bootstrap::lifecycle::{signals, startup};
use service_bootstrap::observability::logging;

/// Serve an application object over HTTP.
#[derive(Parser, Debug)]
#[command(name = "service-bootstrap", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host.
    #[arg(long)]
    host: Option<String>,

    /// Bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Application import string, e.g. `main:app`.
    #[arg(long)]
    app: Option<String>,

    /// Seconds to let in-flight connections finish on shutdown.
    #[arg(long)]
    grace_period_secs: Option<u64>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format (pretty or json).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// File (or defaults), then flags on top, then validation.
    fn load_config(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::read_config(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(app) = &self.app {
            config.app.target = app.clone();
        }
        if let Some(secs) = self.grace_period_secs {
            config.shutdown.grace_period_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        config::validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&Default::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(1);
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.listener.host,
        port = config.listener.port,
        app = %config.app.target,
        max_connections = config.listener.max_connections,
        grace_period_secs = config.shutdown.grace_period_secs,
        "service-bootstrap starting"
    );

    let registry = AppRegistry::with_builtin();
    match startup::run(config, &registry, signals::wait_for_shutdown_signal()).await {
        Ok(report) => {
            tracing::info!(
                drained = report.drained,
                forced = report.forced,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "service-bootstrap failed");
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_command_flags() {
        let cli = Cli::try_parse_from([
            "service-bootstrap",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--app",
            "main:app",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.app.target, "main:app");
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "service-bootstrap",
            "--port",
            "9001",
            "--grace-period-secs",
            "3",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.listener.port, 9001);
        assert_eq!(config.shutdown.grace_period_secs, 3);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_flags_fail_validation() {
        let cli = Cli::try_parse_from(["service-bootstrap", "--app", "main"]).unwrap();
        assert!(matches!(cli.load_config(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn flags_replace_invalid_file_values() {
        let path = std::env::temp_dir().join(format!(
            "service-bootstrap-cli-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[app]\ntarget = \"main\"\n").unwrap();
        let config_arg = path.display().to_string();

        let cli = Cli::try_parse_from([
            "service-bootstrap",
            "--config",
            config_arg.as_str(),
            "--app",
            "main:app",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.app.target, "main:app");

        let cli = Cli::try_parse_from(["service-bootstrap", "--config", config_arg.as_str()]).unwrap();
        let err = cli.load_config().unwrap_err();
        std::fs::remove_file(&path).unwrap();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors[0].field, "app.target"),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn out_of_range_port_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["service-bootstrap", "--port", "70000"]).is_err());
    }
}

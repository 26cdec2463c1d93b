use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

mod api;
mod cli;
mod config;
mod endpoints;
mod error;
mod export;
mod fsutil;
mod logging;
mod orchestrator;

use api::{ApiClient, HttpTransport};
use cli::Args;
use config::{ApiToken, CliOverrides, FileConfig, LogLevel, Settings};
use endpoints::Registry;
use orchestrator::{EXIT_CONFIGURATION_ERROR, Orchestrator};

fn main() -> ExitCode {
    let args = Args::parse();

    if args.list_endpoints {
        print_endpoints(Registry::builtin());
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<u8> {
    let started = chrono::Utc::now();

    let file_config = match &args.config {
        Some(path) => match FileConfig::load(path) {
            Ok(config) => config,
            Err(e) => return Ok(configuration_failure(&e)),
        },
        None => FileConfig::default(),
    };

    let cli = CliOverrides {
        output: args.output.clone(),
        verbose: args.verbose,
    };
    let settings = match Settings::resolve(&cli, &file_config, &config::process_env) {
        Ok(settings) => settings,
        Err(e) => return Ok(configuration_failure(&e)),
    };

    let log_path = logging::init(settings.log_level, &settings.output_dir, started)?;

    tracing::info!("SentinelOne Exporter v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Console: {}", settings.base_url);
    tracing::info!("Output directory: {}", settings.output_dir.display());
    tracing::debug!("Logging to {}", log_path.display());

    if settings.uses_plain_http() {
        tracing::warn!("Base URL uses plain HTTP; the API token will be sent unencrypted");
    }

    let registry = Registry::builtin();
    let token = match preflight(registry, args.endpoints.as_deref(), &config::process_env) {
        Ok(token) => token,
        Err(code) => return Ok(code),
    };

    let transport = HttpTransport::new(settings.base_url.clone(), token, settings.timeout)
        .context("Failed to create HTTP client")?;
    let client = ApiClient::new(transport, settings.retry);
    tracing::debug!(
        "Retry policy: {} attempt(s), worst-case wait {:?} per page",
        settings.retry.max_attempts,
        client.retry_policy().max_total_wait()
    );

    let orchestrator = Orchestrator::new(
        &client,
        registry,
        settings.output_dir.clone(),
        settings.export.clone(),
        settings.max_pages,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let summary = match runtime.block_on(orchestrator.run(args.endpoints.as_deref())) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Ok(EXIT_CONFIGURATION_ERROR);
        }
    };

    summary.log();
    match summary.write_json(&settings.output_dir) {
        Ok(path) => tracing::info!("Summary written to {}", path.display()),
        Err(e) => tracing::warn!("{:#}", e),
    }

    Ok(summary.exit_code())
}

/// Token and endpoint checks that must pass before the HTTP client exists
///
/// Returns the exit code to stop with when either check fails.
fn preflight(
    registry: Registry,
    requested: Option<&[String]>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ApiToken, u8> {
    let checked = config::resolve_token(env).and_then(|token| {
        registry.select(requested)?;
        Ok(token)
    });

    checked.map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        tracing::error!("No endpoints attempted");
        EXIT_CONFIGURATION_ERROR
    })
}

/// Report a configuration problem found before logging to a file was possible
fn configuration_failure(error: &error::ConfigError) -> u8 {
    logging::init_console(LogLevel::Info);
    tracing::error!("Configuration error: {}", error);
    tracing::error!("No endpoints attempted");
    EXIT_CONFIGURATION_ERROR
}

fn print_endpoints(registry: Registry) {
    println!("{:<12} {:<18} {:<10} {}", "NAME", "PATH", "PAGING", "OUTPUT");
    for endpoint in registry.all() {
        println!(
            "{:<12} {:<18} {:<10} {}",
            endpoint.name,
            endpoint.path,
            endpoint.pagination.name(),
            endpoint.output_file
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_token(name: &str) -> Option<String> {
        (name == "S1_API_TOKEN").then(|| "secret".to_string())
    }

    fn empty_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_token_stops_with_configuration_exit_code() {
        let result = preflight(Registry::builtin(), None, &empty_env);
        assert_eq!(result.unwrap_err(), EXIT_CONFIGURATION_ERROR);
    }

    #[test]
    fn test_unknown_endpoint_stops_with_configuration_exit_code() {
        let requested = vec!["sites".to_string(), "widgets".to_string()];
        let result = preflight(Registry::builtin(), Some(requested.as_slice()), &env_with_token);
        assert_eq!(result.unwrap_err(), EXIT_CONFIGURATION_ERROR);
    }

    #[test]
    fn test_valid_selection_returns_token() {
        let requested = vec!["Sites".to_string(), "agents".to_string()];
        let token = preflight(Registry::builtin(), Some(requested.as_slice()), &env_with_token).unwrap();
        assert_eq!(token.expose(), "secret");
    }
}

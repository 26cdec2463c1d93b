use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::api::RetryPolicy;
use crate::error::ConfigError;
use crate::export::{ExportOptions, RecordErrorPolicy};

/// Token variables, checked in order; the first non-empty one wins
pub const TOKEN_ENV_VARS: [&str; 2] = ["S1_API_TOKEN", "API_TOKEN"];
pub const BASE_URL_ENV: &str = "S1_BASE_URL";
pub const OUTPUT_DIR_ENV: &str = "S1_OUTPUT_DIR";
pub const LOG_LEVEL_ENV: &str = "S1_LOG_LEVEL";

pub const DEFAULT_BASE_URL: &str = "https://usea1-012.sentinelone.net/web/api/v2.1";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Optional settings file (`--config`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api: ApiSettings,
    pub retry: RetrySettings,
    pub export: ExportSettings,
    pub logging: LoggingConfig,
}

/// Console connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: String,

    #[serde(default)]
    pub on_record_error: RecordErrorPolicy,

    /// Safety cap on pages fetched per endpoint
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_list_delimiter() -> String {
    ";".to_string()
}

fn default_max_pages() -> u32 {
    10_000
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            list_delimiter: default_list_delimiter(),
            on_record_error: RecordErrorPolicy::default(),
            max_pages: default_max_pages(),
            output_dir: None,
        }
    }
}

impl FileConfig {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Log verbosity accepted from the environment or settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Bearer credential; never printed
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Resolve the API token from the environment, first set variable wins
pub fn resolve_token(env: &dyn Fn(&str) -> Option<String>) -> Result<ApiToken, ConfigError> {
    TOKEN_ENV_VARS
        .iter()
        .find_map(|&name| {
            env(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .map(ApiToken::new)
        .ok_or_else(|| ConfigError::MissingToken {
            checked: TOKEN_ENV_VARS.to_vec(),
        })
}

/// Read a variable from the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Values given on the command line that take part in resolution
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

/// Everything a run needs except the token
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: Url,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub export: ExportOptions,
    pub max_pages: u32,
    pub output_dir: PathBuf,
    pub log_level: LogLevel,
}

impl Settings {
    /// Merge command line, environment and settings file, in that precedence
    pub fn resolve(
        cli: &CliOverrides,
        file: &FileConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let raw_url = non_empty(BASE_URL_ENV)
            .or_else(|| file.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&raw_url)?;

        let output_dir = cli
            .output
            .clone()
            .or_else(|| non_empty(OUTPUT_DIR_ENV).map(PathBuf::from))
            .or_else(|| file.export.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let log_level = if cli.verbose {
            LogLevel::Debug
        } else if let Some(level) = non_empty(LOG_LEVEL_ENV) {
            level.parse()?
        } else if let Some(level) = &file.logging.level {
            level.parse()?
        } else {
            LogLevel::Info
        };

        let retry = RetryPolicy {
            max_attempts: file.retry.max_attempts,
            base_delay: Duration::from_millis(file.retry.base_delay_ms),
            max_delay: Duration::from_millis(file.retry.max_delay_ms),
        };

        let settings = Self {
            base_url,
            timeout: Duration::from_secs(file.api.timeout_secs),
            retry,
            export: ExportOptions {
                list_delimiter: file.export.list_delimiter.clone(),
                on_record_error: file.export.on_record_error,
            },
            max_pages: file.export.max_pages,
            output_dir,
            log_level,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// True when the token would travel over an unencrypted connection
    pub fn uses_plain_http(&self) -> bool {
        self.base_url.scheme() == "http"
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts < 1 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay.as_millis(),
                self.retry.max_delay.as_millis()
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("api.timeout_secs must be greater than 0".to_string()));
        }
        if self.export.list_delimiter.is_empty() {
            return Err(ConfigError::Invalid("export.list_delimiter must not be empty".to_string()));
        }
        if self.max_pages < 1 {
            return Err(ConfigError::Invalid("export.max_pages must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(url)
}

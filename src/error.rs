//! Error types for the exporter.
//!
//! Configuration problems are fatal before any request is made. API and
//! export errors stay scoped to the endpoint that produced them.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors detected while resolving settings or selecting endpoints
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API token found; set one of: {}", .checked.join(", "))]
    MissingToken { checked: Vec<&'static str> },

    #[error("unknown endpoint name(s): {} (known: {})", .unknown.join(", "), .known.join(", "))]
    UnknownEndpoints {
        unknown: Vec<String>,
        known: Vec<&'static str>,
    },

    #[error("invalid log level '{0}' (expected DEBUG, INFO, WARNING or ERROR)")]
    InvalidLogLevel(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Errors raised by the HTTP requestor and paginator
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication rejected ({status}) for {path}")]
    Authentication { status: u16, path: String },

    #[error("request to {path} failed with status {status}")]
    Request { status: u16, path: String },

    #[error("giving up on {path} after {attempts} attempt(s): {last_error}")]
    TransientFailure {
        path: String,
        attempts: u32,
        last_error: String,
    },

    #[error("malformed response from {path}: {reason}")]
    MalformedResponse { path: String, reason: String },

    #[error("failed to build request: {0}")]
    Build(String),
}

/// Failure of a single attempt, before retry classification is applied
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be constructed; retrying cannot help
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors raised while flattening or writing a table
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("record {index}: column '{column}' produced twice while flattening")]
    DuplicateColumn { index: usize, column: String },

    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

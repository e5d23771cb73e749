// ⚠️ Error Taxonomy
// Failures that halt a render pass. Per-row date problems are not errors:
// those rows land in `Normalization::rejected` instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reaching or reading the record source.
///
/// Every variant is fatal to the current pass: the caller shows the message
/// and renders nothing else.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Authentication or source lookup failed (sheet not found, file missing,
    /// credentials rejected).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connected, but the rows could not be read.
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SourceError {
    /// True when the handle itself is suspect and should be re-established.
    pub fn is_connection(&self) -> bool {
        matches!(self, SourceError::Connection(_) | SourceError::Http(_))
    }
}

/// Errors raised while loading `earnings.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid fee rule '{pattern}': {reason}")]
    InvalidFee { pattern: String, reason: String },

    #[error("Invalid source configuration: {0}")]
    InvalidSource(String),
}

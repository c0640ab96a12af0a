use thiserror::Error;

use crate::models::JobId;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid URL \"{url}\": {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no element matches {locator}")]
    ElementNotFound { locator: String },

    #[error("browser session error: {0}")]
    Session(String),

    #[error("artifact write failed: {0}")]
    Artifact(String),

    #[error("unknown platform \"{0}\"")]
    UnknownPlatform(String),

    #[error("page count must be greater than zero")]
    InvalidPageCount,
}

impl From<csv::Error> for HarvestError {
    fn from(err: csv::Error) -> Self {
        Self::Artifact(err.to_string())
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        Self::Artifact(err.to_string())
    }
}

/// Rejected job lookups, surfaced to the submission layer as query results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {0} belongs to another owner")]
    AccessDenied(JobId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

//! Custom error types for ghe
//!
//! User-friendly error messages for all failure scenarios.

use thiserror::Error;

/// Main error type for the ghe application
#[derive(Error, Debug)]
pub enum GheError {
    /// Not running in a git repository
    #[error("This directory is not a git repository.\n\n  → Run 'git init' to create one, or navigate to an existing git project.")]
    NotGitRepository,

    /// The repository has no `origin` remote
    #[error("No 'origin' remote found in this repository.\n\n  → Run 'git remote -v' to check your remotes.\n  → Example: git remote add origin git@github.com:user/repo.git")]
    NoOriginRemote,

    /// Configuration store unreadable, unwritable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Named account does not exist in the store
    #[error("Account '{0}' not found.\n\n  → Run 'ghe list' to see configured accounts.")]
    AccountNotFound(String),

    /// URL cannot be parsed into a known form
    #[error("Cannot classify URL '{url}': {reason}")]
    Classification { url: String, reason: String },

    /// Identity cannot be materialized for this remote
    #[error("Cannot use account '{account}': {reason}")]
    AuthResolution { account: String, reason: String },

    /// Server stopped sending data within the read timeout
    #[error("Network request failed: {0}\n\n  → Check your internet connection.")]
    TransientNetwork(String),

    /// Server answered with a status that will not change on retry
    #[error("Server returned {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Redirect chain exceeded the hop limit or looped
    #[error("Too many redirects while fetching {0}")]
    TooManyRedirects(String),

    /// Destination exists and the overwrite policy forbids replacing it
    #[error("'{0}' already exists.\n\n  → Use --overwrite to replace it or --skip-existing to keep it.")]
    DestinationExists(String),

    /// Several files of one batch resolve to the same path
    #[error("'{0}' is the destination of more than one file in this batch.\n\n  → Keep the directory structure (drop --flat) or download the files separately.")]
    DuplicateDestination(String),

    /// Archive could not be unpacked
    #[error("Failed to extract '{archive}': {reason}\n\n  → The archive was kept; extract it manually with: tar -xzf {archive}")]
    Extraction { archive: String, reason: String },

    /// External program exited unsuccessfully
    #[error("'{program}' failed{}: {stderr}", .code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Git operation error
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Network request error
    #[error("Network request failed: {0}\n\n  → Check your internet connection.")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid glob pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// Invalid input from user
    #[error("{0}")]
    InvalidInput(String),

    /// Operation cancelled by user
    #[error("Operation cancelled.")]
    Cancelled,
}

impl GheError {
    pub(crate) fn classification(url: &str, reason: impl Into<String>) -> Self {
        GheError::Classification {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn auth(account: &str, reason: impl Into<String>) -> Self {
        GheError::AuthResolution {
            account: account.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a retry of the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            GheError::TransientNetwork(_) => true,
            GheError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            GheError::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
            }
            GheError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Result type alias using GheError
pub type Result<T> = std::result::Result<T, GheError>;

//! Error types for depwatch.

use thiserror::Error;

/// Main error type for dependency watch operations.
#[derive(Error, Debug)]
pub enum WatchError {
    // Project validation errors
    #[error("Unsupported path: {0}")]
    UnsupportedPath(String),

    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Unknown ecosystem type: {0}")]
    UnknownEcosystem(String),

    // Report errors
    #[error(
        "Outdated package '{0}' was not listed together with all packages"
    )]
    InconsistentReport(String),

    #[error("Failed to parse dependency report: {0}")]
    ParseError(String),

    #[error("Command '{command}' failed with exit code {code:?}: {stderr}")]
    ProcessFailure {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // Git errors
    #[error("Authorization failed for remote '{remote}': {message}")]
    GitAuthorization { remote: String, message: String },

    #[error("Git operation failed: {0}")]
    GitError(String),

    // Forge errors
    #[error("No commits between {base} and {head}")]
    NoCommitsBetween { base: String, head: String },

    #[error("Forge operation failed: {0}")]
    ForgeError(String),

    // Configuration and scheduling errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A watch round is already running")]
    AlreadyRunning,

    // Parsing errors - automatic conversions via #[from]
    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("XML parse error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    // Generic wrapper for other errors
    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using WatchError
pub type Result<T> = std::result::Result<T, WatchError>;

impl WatchError {
    /// Create an invalid project error
    pub fn invalid_project(msg: impl Into<String>) -> Self {
        Self::InvalidProject(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a git error
    pub fn git(msg: impl Into<String>) -> Self {
        Self::GitError(msg.into())
    }

    /// Create a forge error
    pub fn forge(msg: impl Into<String>) -> Self {
        Self::ForgeError(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error is a credential rejection from a git remote
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::GitAuthorization { .. })
    }
}

// Implement From for std::io::Error - wraps in Other variant for generic I/O errors
impl From<std::io::Error> for WatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}

// Implement From for octocrab errors (GitHub API)
impl From<octocrab::Error> for WatchError {
    fn from(err: octocrab::Error) -> Self {
        Self::forge(format!("GitHub API error: {err}"))
    }
}

//! Error types for avitag.

/// Result type alias for avitag operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for avitag.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to read species reference list file.
    #[error("failed to read species list file '{path}'")]
    SpeciesListRead {
        /// Path to the species list file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to download an image.
    #[error("failed to download image from '{url}'")]
    ImageDownload {
        /// URL that failed.
        url: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to launch the primary classifier process.
    #[error("failed to launch classifier command '{command}'")]
    ClassifierLaunch {
        /// Command that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Primary classifier process exited with a failure status.
    #[error("classifier run failed (exit status {status}): {stderr}")]
    ClassifierFailed {
        /// Exit status description.
        status: String,
        /// Captured stderr output.
        stderr: String,
    },

    /// Classifier produced no predictions file.
    #[error("classifier produced no predictions file at '{path}'")]
    PredictionsMissing {
        /// Expected path of the predictions file.
        path: std::path::PathBuf,
    },

    /// Failed to parse classifier predictions output.
    #[error("failed to parse predictions file '{path}'")]
    PredictionsParse {
        /// Path to the predictions file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Fallback classifier request failed.
    #[error("fallback classifier request failed")]
    FallbackRequest {
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// Fallback classifier rejected the call due to rate limiting.
    #[error("fallback classifier rate limited (HTTP 429)")]
    FallbackRateLimited,

    /// Fallback classifier returned a non-success response.
    #[error("fallback classifier error (HTTP {status}): {body}")]
    FallbackResponse {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Fallback classifier returned an unparseable completion.
    #[error("fallback classifier returned an unparseable completion: {reason}")]
    FallbackParse {
        /// Description of the parse failure.
        reason: String,
    },

    /// Persistence store request failed.
    #[error("store request failed")]
    StoreRequest {
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// Persistence store returned a non-success response.
    #[error("store error (HTTP {status}): {body}")]
    StoreResponse {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

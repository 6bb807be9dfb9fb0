use std::io;

/// Error type for release_hook_relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    StartupConfig(String),

    #[error("Malformed hook payload: {0}")]
    MalformedPayload(String),

    #[error("Failed to fetch diagnostic for test '{test_name}': {message}")]
    DiagnosticFetch { test_name: String, message: String },

    #[error("Failed to fetch releases for app '{app}': {message}")]
    ReleaseFetch { app: String, message: String },

    #[error("No releases found for app '{app}'")]
    NoReleases { app: String },

    #[error("Failed to trigger test run for tag '{tag}': {message}")]
    Dispatch { tag: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

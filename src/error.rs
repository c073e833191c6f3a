//! Error types for the cluster smoke test

use std::process::ExitStatus;

use thiserror::Error;

/// Error variants are named with the `Error` suffix where they wrap another
/// crate's error (e.g., `KubeError`, `SerializationError`).
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid cluster credential: {0}")]
    InvalidCredential(String),

    #[error("Failed to decode node group template: {0}")]
    TemplateDecode(String),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Gave up waiting for {what} after {attempts} attempts")]
    ConvergenceExhausted { what: String, attempts: u32 },

    #[error("{0} smoke check(s) failed")]
    ChecksFailed(usize),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Script {script} exited with {status}: {stderr}")]
    ScriptFailed {
        script: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl Error {
    /// Check if this error is expected to clear up on its own
    ///
    /// Only failures observed while talking to a live cluster are transient.
    /// Anything decoded from caller input is permanent. Readiness polling
    /// does not consult this and retries every API error until its budget is
    /// spent; the classification only annotates poll logs.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(api_err) => {
                    // 4xx errors (except 404 NotFound, 409 Conflict, 429 TooManyRequests)
                    // will not change by waiting
                    let code = api_err.code;
                    if (400..500).contains(&code) {
                        return code == 404 || code == 409 || code == 429;
                    }
                    true
                }
                // Network and other errors are retryable
                _ => true,
            },
            Error::HttpError(_) => true,
            Error::ConvergenceExhausted { .. } => true,
            Error::InvalidCredential(_) => false,
            Error::TemplateDecode(_) => false,
            Error::SerializationError(_) => false,
            Error::ChecksFailed(_) => false,
            Error::ConfigError(_) => false,
            Error::Io(_) => false,
            Error::ScriptFailed { .. } => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

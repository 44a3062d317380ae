use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Browser session not started. Call start_browser first.")]
    SessionNotStarted,

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Timed out locating element: {0}")]
    LocateTimeout(String),

    #[error("Unsupported locator strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Context file not found: {0}")]
    ContextFileNotFound(String),

    #[error("Context file malformed: {0}")]
    ContextFileMalformed(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Failures that abort the run instead of being fed back to the oracle
    /// as a tool result.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Error::SessionNotStarted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

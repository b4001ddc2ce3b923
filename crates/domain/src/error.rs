/// Shared error type used across all ChatRelay crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// One or more attachments could not be resolved. Carries the display
    /// names of every attachment that failed, verbatim.
    #[error("failed to resolve {} attachment(s)", failed.len())]
    FileAccess { failed: Vec<String> },

    #[error("attachment {name} is {size_bytes} bytes (limit {limit_bytes})")]
    FileTooLarge {
        name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("stream: {0}")]
    Stream(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable wire code surfaced in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::FileAccess { .. } => "FILE_ACCESS_ERROR",
            Error::FileTooLarge { .. } => "FILE_SIZE_ERROR",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Forbidden(_) => "FORBIDDEN",
            _ => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Error parsing content: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to deliver message: {0}")]
    Transport(String),

    #[error("Failed to fetch data: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Short label used in logs and admin reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AuthError",
            AppError::Parse(_) => "ParseError",
            AppError::Storage(_) => "StorageError",
            AppError::Transport(_) => "TransportError",
            AppError::Fetch(_) => "FetchError",
            AppError::Config(_) => "ConfigError",
        }
    }
}

/// Renders an error with every cause in its source chain.
pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Fetch(describe(&err))
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::Config(describe(&err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(describe(&err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

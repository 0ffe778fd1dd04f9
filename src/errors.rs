use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// One or more configuration problems, all reported together.
    #[error("Configuration error:\n  - {}", .0.join("\n  - "))]
    Config(Vec<String>),

    #[error("Environment file error: {0}")]
    EnvFile(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

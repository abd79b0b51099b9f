//! Error types for stratakv

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Client Errors ===
    #[error("{0}")]
    BadArgument(String),

    #[error("No shard found: {0}")]
    NotFound(String),

    // === Durability Errors ===
    #[error("WAL append failed: {0}")]
    Durability(String),

    // === Replication Errors ===
    #[error("Did not receive majority acknowledgments")]
    ReplicationQuorum,

    // Carries the peer's own failure message when one was returned
    #[error("{0}")]
    Unreachable(String),

    // === Store Errors ===
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unreachable(_) | Error::ReplicationQuorum)
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::BadArgument(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Durability(_)
            | Error::ReplicationQuorum
            | Error::Unreachable(_)
            | Error::Sqlite(_)
            | Error::Io(_)
            | Error::Internal(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Every handler surfaces failures as {message, status: "failure"}
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        let body = Json(json!({
            "message": self.to_string(),
            "status": "failure",
        }));
        (status, body).into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Unreachable(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {}", e))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

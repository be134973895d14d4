//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::config::BackendKind;
use serde::Serialize;
use thiserror::Error;

/// Invalid or incomplete backend configuration. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required backend '{0}' is not configured")]
    MissingBackend(String),
    #[error("duplicate backend name: {0}")]
    DuplicateName(String),
    #[error("backend entry at position {0} has an empty name")]
    EmptyName(usize),
    #[error("backend '{0}' has an empty connection string")]
    EmptyConnectionString(String),
    #[error("backend '{name}': cannot infer kind from connection string '{connection}'")]
    UnknownKind { name: String, connection: String },
    #[error("backend '{name}': kind {kind} does not match connection string scheme ({inferred})")]
    KindMismatch {
        name: String,
        kind: BackendKind,
        inferred: BackendKind,
    },
    #[error("backend '{0}': in-memory SQLite cannot be shared between connections")]
    InMemoryEmbedded(String),
    #[error("active backend '{0}' is not in the catalog")]
    UnknownActive(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Schema migration failed against one configured backend. Fatal at startup.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("backend '{backend}': connect failed: {source}")]
    Connect {
        backend: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("backend '{backend}': migration {version} ({description}) failed: {source}")]
    Apply {
        backend: String,
        version: i64,
        description: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("backend '{backend}': {message}")]
    Prepare { backend: String, message: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
}

/// A context for the selected backend could not be opened. Recoverable per unit of work.
#[derive(Error, Debug)]
pub enum ContextCreationError {
    #[error("backend '{backend}': invalid connection string: {source}")]
    InvalidConnectionString {
        backend: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("backend '{backend}': connection failed: {source}")]
    Connect {
        backend: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("save cancelled before commit")]
    Cancelled,
    #[error("{entity} '{id}' was not found while saving")]
    Concurrency { entity: &'static str, id: String },
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Errors that abort the process before any traffic is served.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Context(#[from] ContextCreationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Selection(SelectionError::UnknownBackend(_)) => {
                (StatusCode::BAD_REQUEST, "unknown_backend")
            }
            AppError::Context(_) => (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable"),
            AppError::Persistence(e) => match e {
                PersistenceError::Concurrency { .. } => (StatusCode::CONFLICT, "conflict"),
                PersistenceError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "bad_request"),
                PersistenceError::Db(sqlx::Error::RowNotFound) => {
                    (StatusCode::NOT_FOUND, "not_found")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

use axum::response::{IntoResponse, Response};
use error_stack::Report;
use filigree::errors::HttpError;
use http::StatusCode;
use thiserror::Error;

/// The top-level error type from the platform
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to initialize database
    #[error("Failed to initialize database")]
    DbInit,
    /// Database error not otherwise handled
    #[error("Database error")]
    Db,
    /// Configuration error
    #[error("Configuration error")]
    Config,
    /// Failed to start the HTTP server
    #[error("Failed to start server")]
    ServerStart,
    /// Failure while shutting down
    #[error("Encountered error while shutting down")]
    Shutdown,
    /// A background task panicked or was cancelled
    #[error("Background task failed")]
    Task,
    /// The request was malformed or violated an input rule
    #[error("{0}")]
    Validation(String),
    /// The requested item was not found
    #[error("{0} not found")]
    NotFound(&'static str),
    /// A uniqueness constraint was violated
    #[error("{0} already exists")]
    Conflict(&'static str),
    /// A row referenced by another row is missing
    #[error("{0} referenced by stored data is missing")]
    Integrity(&'static str),
    /// A call to the auth bridge or the property store failed
    #[error("Upstream {0} request failed")]
    Upstream(&'static str),
    /// Credentials were rejected or could not be checked
    #[error("Authentication failed")]
    Login,
    /// A wrapper around a Report<Error> to let it be returned from an Axum handler, since we can't
    /// implement IntoResponse on Report
    #[error("{0}")]
    WrapReport(Report<Error>),
}

impl From<Report<Error>> for Error {
    fn from(value: Report<Error>) -> Self {
        Error::WrapReport(value)
    }
}

impl Error {
    /// Shorthand for a validation failure wrapped in a report.
    pub fn validation(message: impl Into<String>) -> Report<Error> {
        Report::new(Error::Validation(message.into()))
    }
}

impl HttpError for Error {
    type Detail = String;

    fn error_kind(&self) -> &'static str {
        match self {
            Error::WrapReport(e) => e.current_context().error_kind(),
            Error::DbInit => "db_init",
            Error::Db => "db",
            Error::Config => "config",
            Error::ServerStart => "server_start",
            Error::Shutdown => "shutdown",
            Error::Task => "task",
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Integrity(_) => "integrity",
            Error::Upstream(_) => "upstream",
            Error::Login => "unauthenticated",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::WrapReport(e) => e.current_context().status_code(),
            Error::DbInit => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Db => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Config => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ServerStart => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Shutdown => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Task => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Login => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_detail(&self) -> String {
        match self {
            Error::WrapReport(e) => format!("{e:#}"),
            _ => String::new(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

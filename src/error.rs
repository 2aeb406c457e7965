use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{
    authentication::{AuthError, SqliteAuthBackend},
    config::ConfigError,
    store::StoreError,
    todos::TodoError,
    views,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Todo(#[from] TodoError),

    #[error("session error: {0}")]
    Session(#[from] axum_login::Error<SqliteAuthBackend>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Auth(AuthError::InvalidEmail | AuthError::InvalidPassword) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Todo(TodoError::NotFound(_) | TodoError::MalformedId(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Todo(TodoError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            return (status, views::message("Internal server error")).into_response();
        }

        (status, views::message(&self.to_string())).into_response()
    }
}

/// Anything that stops the server from coming up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Store(#[from] StoreError),

    #[error("session store error: {0}")]
    SessionStore(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{models::MessageResponse, store::StoreError, validation::Rejection};

pub const INVALID_SEARCH: &str = "Invalid search parameters.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", .0.reason)]
    Validation(Rejection),

    #[error("Invalid search parameters.")]
    InvalidSearch,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Unauthorized.")]
    Unauthorized,

    #[error("{message}")]
    Store {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    pub fn store(message: &'static str) -> impl FnOnce(StoreError) -> AppError {
        move |source| AppError::Store { message, source }
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::Validation(rejection)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(rejection) => (StatusCode::BAD_REQUEST, rejection.reason),
            AppError::InvalidSearch => (StatusCode::BAD_REQUEST, INVALID_SEARCH),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, *message),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized."),
            AppError::Store { message, source } => {
                error!(%source, "{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, *message)
            }
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}

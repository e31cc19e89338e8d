use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chatty_core::{Error, Rejection};
use chatty_types::api::ErrorResponse;
use tracing::error;

/// Engine errors as HTTP responses. Rejections carry their code and a
/// user-facing message; store failures are logged and hidden.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<Rejection> for ApiError {
    fn from(r: Rejection) -> Self {
        Self(Error::Rejected(r))
    }
}

pub fn status_for(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::UnknownUser | Rejection::UnknownMessage | Rejection::UnknownPost => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::Rejected(rejection) => (
                status_for(&rejection),
                Json(ErrorResponse {
                    error: rejection.code().to_string(),
                    message: rejection.to_string(),
                }),
            )
                .into_response(),
            Error::Store(e) => {
                error!("Store failure: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "store_failure".into(),
                        message: "Something went wrong, try again.".into(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use object_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ObjectErr {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Malformed multipart payload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid upload: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    Invalid(String),

    /// An id in a path that cannot name any object.
    #[error("File {0} not found")]
    UnknownId(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ResponseError for ObjectErr {
    fn status_code(&self) -> StatusCode {
        match self {
            ObjectErr::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ObjectErr::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ObjectErr::Store(StoreError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ObjectErr::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ObjectErr::Multipart(_) => StatusCode::BAD_REQUEST,
            ObjectErr::Validation(_) => StatusCode::BAD_REQUEST,
            ObjectErr::Invalid(_) => StatusCode::BAD_REQUEST,
            ObjectErr::UnknownId(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        match self {
            ObjectErr::Validation(errors) => HttpResponse::build(status).json(errors),
            _ => HttpResponse::build(status).json(ErrorBody { error: &self.to_string() }),
        }
    }
}

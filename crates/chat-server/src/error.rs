use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ClientErrorBody {
    status: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ServerErrorBody {
    error: &'static str,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // 5xx bodies are replaced by `RequestTracking`, which adds the request id.
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            return HttpResponse::build(status_code).json(ServerErrorBody {
                error: "Internal Server Error",
            });
        }
        HttpResponse::build(status_code).json(ClientErrorBody {
            status: "error",
            message: self.to_string(),
        })
    }
}

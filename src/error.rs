use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    /// 携带限流窗口长度（秒）
    RateLimited(u64),
    InvalidRequest(String),
    GenerationFailed,
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::GenerationFailed => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::RateLimited(window) => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                window
            ),
            AppError::InvalidRequest(message) => message,
            AppError::GenerationFailed => {
                "The assistant is temporarily unavailable. Please try again later.".to_string()
            }
            AppError::InternalServerError => "Internal server error".to_string(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

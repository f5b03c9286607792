use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::StoreUnavailable(_) => 503,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Database(_)
            | AppError::Internal => 500,
        }
    }

    /// Message text safe to put on any client-facing surface. Internal
    /// variants collapse to a generic line; the real detail goes to logs at
    /// the call site.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Internal => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Config(_)
                | AppError::StartServer(_)
                | AppError::Internal
        )
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Unauthorized => "authentication_error",
            AppError::Forbidden => "authorization_error",
            AppError::NotFound => "not_found_error",
            AppError::StoreUnavailable(_) => "store_unavailable",
            _ => "server_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Internal details stay in logs, not in client-facing bodies.
        if self.is_internal() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.error_type(),
            "message": self.client_message(),
        }));
        (status, body).into_response()
    }
}

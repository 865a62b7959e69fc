use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::domain::errors::{DomainError, UserMessage};

/// Error de dominio convertido en respuesta JSON `{kind, message}`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            DomainError::InvalidInput(_) | DomainError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            DomainError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::ModelLoad { .. } | DomainError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!("❌ {}", self.0);
        (self.status(), Json(UserMessage::from(&self.0))).into_response()
    }
}

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

use crate::models::{ApprovalStatus, Role};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Admin account pending approval")]
    PendingApproval,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid status")]
    InvalidStatus,

    #[error("{kind} is already {status}")]
    AlreadyModerated {
        kind: &'static str,
        status: ApprovalStatus,
    },

    #[error("Mosque not found")]
    MosqueNotFound,

    #[error("Failed to fetch prayer times")]
    ProviderUnavailable,

    #[error("Mosque has no coordinates on record")]
    MissingCoordinates,

    #[error("Invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0} must be base64 encoded")]
    InvalidAttachment(&'static str),

    #[error("Event cannot end before it starts")]
    InvalidEventWindow,

    #[error("Role {0} cannot self-register")]
    RoleNotAllowed(Role),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Storage failure")]
    Store(#[from] StoreError),

    #[error("Internal error")]
    Internal(String),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DuplicateEmail
            | ServiceError::InvalidStatus
            | ServiceError::MissingCoordinates
            | ServiceError::InvalidDate(_)
            | ServiceError::MissingField(_)
            | ServiceError::InvalidAttachment(_)
            | ServiceError::InvalidEventWindow
            | ServiceError::RoleNotAllowed(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidCredentials | ServiceError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::PendingApproval | ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) | ServiceError::MosqueNotFound => StatusCode::NOT_FOUND,
            ServiceError::AlreadyModerated { .. } => StatusCode::CONFLICT,
            ServiceError::ProviderUnavailable => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Store(err) => error!("Store failure: {}", err),
            ServiceError::Internal(detail) => error!("Internal failure: {}", detail),
            _ => {}
        }
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "detail": self.to_string() }))
    }
}

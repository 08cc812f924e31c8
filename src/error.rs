// Error handling module for the AlcoSecure API
// Maps ledger and query errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::consumption::LedgerError;
use crate::query::QueryValidationError;

/// Main error type for the API
/// All handlers return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Field-level validation errors from request DTOs
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Malformed request that is not tied to one field
    /// Maps to HTTP 400 Bad Request
    BadRequest { message: String },

    /// Unknown account or beverage
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Deactivated account or beverage
    /// Maps to HTTP 400 Bad Request
    InactiveResource { message: String },

    /// Duplicate resource conflict
    /// Maps to HTTP 409 Conflict
    Conflict { message: String },

    /// Store failure; the caller may retry
    /// Maps to HTTP 500 Internal Server Error
    /// `purchase_id` is set when a purchase was recorded but its account
    /// increment was lost
    PersistenceError {
        message: String,
        purchase_id: Option<Uuid>,
    },
}

/// Consistent error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "NOT_FOUND")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (field errors, retry hints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(error_code: &str, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message: message.into(),
            details,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Logging follows severity: error! for 500-level, warn! for conflicts
    /// and deactivated resources, debug! for expected client errors.
    /// Store error text is logged but never sent to the client.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(
                        "VALIDATION_ERROR",
                        "Request validation failed",
                        Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({}))),
                    ),
                )
            }
            ApiError::BadRequest { message } => {
                debug!("Bad request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("VALIDATION_ERROR", message.clone(), None),
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new(
                        "NOT_FOUND",
                        format!("{} with id {} not found", resource, id),
                        None,
                    ),
                )
            }
            ApiError::InactiveResource { message } => {
                warn!("Inactive resource: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("INACTIVE_RESOURCE", message.clone(), None),
                )
            }
            ApiError::Conflict { message } => {
                warn!("Conflict error: {}", message);
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::new("CONFLICT", message.clone(), None),
                )
            }
            ApiError::PersistenceError {
                message,
                purchase_id,
            } => {
                error!("Persistence error: {} (purchase: {:?})", message, purchase_id);
                let client_message = match purchase_id {
                    Some(id) => format!(
                        "Purchase {} was recorded but the account total could not be updated",
                        id
                    ),
                    None => "A storage error occurred".to_string(),
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "PERSISTENCE_ERROR",
                        client_message,
                        Some(serde_json::json!({
                            "retriable": true,
                            "purchase_id": purchase_id,
                        })),
                    ),
                )
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidFields(errors) => ApiError::ValidationError(errors),
            LedgerError::InvalidRequest(_) | LedgerError::InvalidPolicy(_) => ApiError::BadRequest {
                message: err.to_string(),
            },
            LedgerError::UnknownAccount(user_ref) => ApiError::NotFound {
                resource: "Account".to_string(),
                id: user_ref,
            },
            LedgerError::UnknownBeverage(id) => ApiError::NotFound {
                resource: "Beverage".to_string(),
                id: id.to_string(),
            },
            LedgerError::InactiveAccount(_) | LedgerError::InactiveBeverage(_) => {
                ApiError::InactiveResource {
                    message: err.to_string(),
                }
            }
            LedgerError::AccountExists(_) => ApiError::Conflict {
                message: err.to_string(),
            },
            LedgerError::Persistence(message) => ApiError::PersistenceError {
                message,
                purchase_id: None,
            },
            LedgerError::Inconsistent {
                purchase_id,
                reason,
            } => ApiError::PersistenceError {
                message: reason,
                purchase_id: Some(purchase_id),
            },
        }
    }
}

impl From<QueryValidationError> for ApiError {
    fn from(err: QueryValidationError) -> Self {
        ApiError::BadRequest {
            message: err.message,
        }
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

/// Error handling for the API server
///
/// Handlers, extractors and middleware return `Result<T, ApiError>`; the
/// `IntoResponse` impl below is the only place failures become HTTP
/// responses:
///
/// ```json
/// { "status": "fail", "message": "No tour found with that ID" }
/// ```
///
/// 4xx responses carry `"fail"`, 5xx responses `"error"`. Internal details
/// are logged and replaced by a generic message.
///
/// # Example
///
/// ```
/// use natourex_api::error::{ApiError, ApiResult};
///
/// fn find(id: u32) -> ApiResult<u32> {
///     if id == 0 {
///         return Err(ApiError::NotFound("No tour found with that ID".to_string()));
///     }
///     Ok(id)
/// }
///
/// assert!(find(0).is_err());
/// ```

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use natourex_shared::{
    auth::{jwt::JwtError, password::PasswordError},
    geo::GeoError,
    query::QueryError,
    repository::RepoError,
};
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

use crate::images::ImageError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Message sent instead of internal error details
pub const INTERNAL_MESSAGE: &str = "Something went very wrong!";

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Input failed validation (400)
    #[error("Invalid input data. {0}")]
    Validation(String),

    /// Unauthorized (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `fail` for client errors, `error` for server errors
    pub status: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg) => msg.clone(),
            ApiError::Validation(_) => self.to_string(),
            ApiError::InternalError(_) => INTERNAL_MESSAGE.to_string(),
        }
    }

    /// `NotFound` for a missing record of the named entity
    pub fn no_record(entity: &str) -> Self {
        ApiError::NotFound(format!("No {} found with that ID", entity))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            status: if status.is_client_error() { "fail" } else { "error" }.to_string(),
            message: self.client_message(),
        });

        (status, body).into_response()
    }
}

/// Joins every validation message, sorted by field for stable output
pub fn validation_messages(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field))
            })
        })
        .collect::<Vec<_>>()
        .join(". ")
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(validation_messages(&errors))
    }
}

/// Convert repository errors to API errors
impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } | RepoError::InvalidReference(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RepoError::Database(_)
            | RepoError::Corrupt(_)
            | RepoError::Password(_)
            | RepoError::Poisoned => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<GeoError> for ApiError {
    fn from(err: GeoError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => {
                ApiError::Unauthorized("Your token has expired! Please log in again.".to_string())
            }
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized("Invalid token. Please log in again!".to_string()),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::NotAnImage
            | ImageError::TooMany { .. }
            | ImageError::UnexpectedField(_)
            | ImageError::Decode(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ImageError::Encode(_) | ImageError::Io(_) | ImageError::Task(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

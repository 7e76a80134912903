/// Request extractors with `ApiError` rejections
///
/// - [`ApiJson`]: JSON body; malformed bodies become 400 `fail` responses
/// - [`ValidJson`]: JSON body checked with `validator`
/// - [`ApiPath`]: path parameters; e.g. a malformed id becomes 400

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

#[derive(Debug, axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// JSON body that passed validation
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Decodes a raw query string into ordered key/value pairs
pub fn query_pairs(raw: Option<&str>) -> Result<Vec<(String, String)>, ApiError> {
    match raw {
        Some(raw) if !raw.is_empty() => serde_urlencoded::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e))),
        _ => Ok(Vec::new()),
    }
}

/// Encodes pairs back into a query string
pub fn encode_pairs(pairs: &[(String, String)]) -> Result<String, ApiError> {
    serde_urlencoded::to_string(pairs)
        .map_err(|e| ApiError::InternalError(format!("Query encoding failed: {}", e)))
}

/// Authentication endpoints
///
/// This module provides signup, login and logout. A successful signup or
/// login answers with the user and a JWT, also set as an HttpOnly `jwt`
/// cookie so browser clients are authenticated on later requests.
///
/// # Endpoints
///
/// - `POST /api/v2/users/signup` - Create an account (role `user`)
/// - `POST /api/v2/users/login` - Exchange email and password for a token
/// - `GET /api/v2/users/logout` - Overwrite the token cookie

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Duration;
use natourex_shared::{
    auth::{jwt, password::verify_password_blocking},
    models::{CreateUser, User},
};
use serde::Deserialize;

use super::{users::UserData, Envelope};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ValidJson},
    middleware::auth::JWT_COOKIE,
};

/// Cookie value written on logout
pub const LOGGED_OUT: &str = "loggedout";

/// Lifetime of the logout cookie, in seconds
const LOGOUT_COOKIE_SECS: i64 = 10;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn token_cookie(value: &str, max_age_secs: i64, secure: bool) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly",
        JWT_COOKIE, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::InternalError(format!("Invalid cookie header: {}", e)))
}

/// Issues a token for the user and builds the response carrying it
fn send_token(state: &AppState, user: User, status: StatusCode) -> ApiResult<Response> {
    let jwt_config = &state.config.jwt;

    let claims = jwt::Claims::new(user.id, user.role, Duration::days(jwt_config.expires_in_days));
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    let cookie = token_cookie(
        &token,
        jwt_config.cookie_expires_in_days * 24 * 60 * 60,
        state.config.api.is_production(),
    )?;

    let body = Envelope::success(UserData { user }).with_token(token);

    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// `POST /signup`
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or email already registered
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateUser>,
) -> ApiResult<Response> {
    let user = state.repos.users.create(input).await?;

    tracing::info!(user_id = %user.id, "User signed up");

    send_token(&state, user, StatusCode::CREATED)
}

/// `POST /login`
///
/// # Errors
///
/// - `400 Bad Request`: Email or password missing
/// - `401 Unauthorized`: Unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    let (email, password) = match (req.email, req.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Please provide email and password!".to_string(),
            ))
        }
    };

    let incorrect = || ApiError::Unauthorized("Incorrect email or password".to_string());

    let credentials = state
        .repos
        .credentials
        .find_credentials(&email)
        .await?
        .ok_or_else(incorrect)?;

    if !verify_password_blocking(password, credentials.password_hash).await? {
        tracing::warn!(user_id = %credentials.user.id, "Failed login attempt");
        return Err(incorrect());
    }

    tracing::info!(user_id = %credentials.user.id, "User logged in");

    send_token(&state, credentials.user, StatusCode::OK)
}

/// `GET /logout`
pub async fn logout(State(state): State<AppState>) -> ApiResult<Response> {
    let cookie = token_cookie(
        LOGGED_OUT,
        LOGOUT_COOKIE_SECS,
        state.config.api.is_production(),
    )?;

    Ok(([(header::SET_COOKIE, cookie)], Json(Envelope::empty())).into_response())
}

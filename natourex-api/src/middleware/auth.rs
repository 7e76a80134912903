/// Authentication and role checks for protected routes
///
/// [`protect`] accepts a JWT from `Authorization: Bearer <token>` or from the
/// `jwt` cookie, checks that the user still exists and stores an
/// [`AuthContext`] in the request extensions. [`restrict_to`] then compares
/// the user's current role with the roles allowed on the route.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use natourex_shared::{
    auth::jwt,
    models::{Role, User},
};

use super::cookies::Cookies;
use crate::{app::AppState, error::ApiError};

/// Name of the token cookie
pub const JWT_COOKIE: &str = "jwt";

/// Authenticated user of the current request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.user.role)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
            ApiError::Unauthorized("You are not logged in! Please log in to get access.".to_string())
        })
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn cookie_token(request: &Request) -> Option<String> {
    let from_headers;
    let cookies = match request.extensions().get::<Cookies>() {
        Some(cookies) => cookies,
        None => {
            from_headers = Cookies::from_headers(request.headers());
            &from_headers
        }
    };

    cookies
        .get(JWT_COOKIE)
        .filter(|token| *token != crate::routes::auth::LOGGED_OUT)
        .map(str::to_string)
}

/// Requires a valid token for an existing user
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .or_else(|| cookie_token(&request))
        .ok_or_else(|| {
            ApiError::Unauthorized("You are not logged in! Please log in to get access.".to_string())
        })?;

    let claims = jwt::validate_token(&token, state.jwt_secret())?;

    let user = state
        .repos
        .users
        .find_by_id(claims.sub, &[])
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "The user belonging to this token does no longer exist.".to_string(),
            )
        })?;

    tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");
    request.extensions_mut().insert(AuthContext { user });

    Ok(next.run(request).await)
}

/// Allows only the given roles; must run after [`protect`]
pub async fn restrict_to(
    roles: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let allowed = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(|auth| auth.has_role(roles));

    if !allowed {
        return Err(ApiError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// Wraps a method router with [`protect`] and, for a non-empty role list,
/// [`restrict_to`]
pub fn protected(
    route: MethodRouter<AppState>,
    state: &AppState,
    roles: &'static [Role],
) -> MethodRouter<AppState> {
    let route = if roles.is_empty() {
        route
    } else {
        route.route_layer(from_fn(move |request: Request, next: Next| {
            restrict_to(roles, request, next)
        }))
    };

    route.route_layer(from_fn_with_state(state.clone(), protect))
}

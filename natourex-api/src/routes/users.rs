/// User routes
///
/// # Endpoints
///
/// ```text
/// POST   /api/v2/users/signup     public
/// POST   /api/v2/users/login      public
/// GET    /api/v2/users/logout     public
/// GET    /api/v2/users/me         logged in
/// PATCH  /api/v2/users/updateMe   logged in
/// GET    /api/v2/users            admin
/// GET    /api/v2/users/:id        admin
/// PATCH  /api/v2/users/:id        admin
/// DELETE /api/v2/users/:id        admin
/// ```

use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};
use natourex_shared::models::{Role, UpdateUser, User};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    auth,
    factory::{self, fetch_one, Single},
    Data, Envelope,
};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidJson,
    middleware::auth::{protected, AuthContext},
};

/// Roles allowed to manage other users
pub const USER_ADMINS: &[Role] = &[Role::Admin];

/// Profile changes a user may make to their own account
///
/// Fields other than `name` and `email` are ignored, so a user cannot
/// change their own role. Password fields are rejected.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    pub password: Option<String>,

    pub password_confirm: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: User,
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/me", protected(get(get_me), state, &[]))
        .route("/updateMe", protected(patch(update_me), state, &[]))
        .route(
            "/",
            protected(get(factory::get_all::<User>), state, USER_ADMINS),
        )
        .route(
            "/:id",
            protected(
                get(factory::get_one::<User>)
                    .patch(factory::update_one::<User>)
                    .delete(factory::delete_one::<User>),
                state,
                USER_ADMINS,
            ),
        )
}

/// `GET /me`: the authenticated user's record
pub async fn get_me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Single<User>> {
    let data = fetch_one::<User>(&state, auth.user.id, &[]).await?;
    Ok(Json(Envelope::success(Data { data })))
}

/// `PATCH /updateMe`
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidJson(input): ValidJson<UpdateMeRequest>,
) -> ApiResult<Json<Envelope<UserData>>> {
    if input.password.is_some() || input.password_confirm.is_some() {
        return Err(ApiError::BadRequest(
            "This route is not for password updates.".to_string(),
        ));
    }

    let update = UpdateUser {
        name: input.name,
        email: input.email,
        ..Default::default()
    };

    let user = state
        .repos
        .users
        .update(auth.user.id, update)
        .await?
        .ok_or_else(|| ApiError::no_record("user"))?;

    tracing::info!(user_id = %user.id, "Updated own profile");

    Ok(Json(Envelope::success(UserData { user })))
}

/// Review routes
///
/// Every review route requires a logged-in user. Reviews are also reachable
/// under a tour (`/api/v2/tours/:id/reviews`), where listings are restricted
/// to that tour and new reviews default to it.
///
/// # Endpoints
///
/// ```text
/// GET    /api/v2/reviews         logged in
/// POST   /api/v2/reviews         user
/// GET    /api/v2/reviews/:id     logged in
/// PATCH  /api/v2/reviews/:id     user, admin
/// DELETE /api/v2/reviews/:id     user, admin
/// ```

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use natourex_shared::{
    models::{CreateReview, Review, Role},
    query::{find_field, FieldValue, Filter},
    repository::Entity,
};
use uuid::Uuid;
use validator::Validate;

use super::{
    factory::{self, list_entities, Listing, Single},
    Data, Envelope,
};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{query_pairs, ApiJson, ApiPath},
    middleware::auth::{protected, AuthContext},
};

/// Roles allowed to write reviews
pub const REVIEW_AUTHORS: &[Role] = &[Role::User];

/// Roles allowed to change or delete reviews
pub const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            protected(get(factory::get_all::<Review>), state, &[])
                .merge(protected(post(create_review), state, REVIEW_AUTHORS)),
        )
        .route(
            "/:id",
            protected(get(factory::get_one::<Review>), state, &[]).merge(protected(
                patch(factory::update_one::<Review>).delete(factory::delete_one::<Review>),
                state,
                REVIEW_EDITORS,
            )),
        )
}

/// Equality filter on a review's tour
fn tour_filter(tour_id: Uuid) -> ApiResult<Filter> {
    let field = find_field(Review::FIELDS, "tour")
        .ok_or_else(|| ApiError::InternalError("Review catalog has no tour field".to_string()))?;
    Ok(Filter::equals(field, FieldValue::Id(tour_id)))
}

/// Fills the tour and author when the body leaves them out
fn with_defaults(mut input: CreateReview, tour_id: Option<Uuid>, auth: &AuthContext) -> CreateReview {
    if input.tour.is_none() {
        input.tour = tour_id;
    }
    if input.user.is_none() {
        input.user = Some(auth.user.id);
    }
    input
}

async fn create(state: &AppState, input: CreateReview) -> ApiResult<(StatusCode, Single<Review>)> {
    input.validate()?;

    let data = state.repos.reviews.create(input).await?;

    tracing::info!(review_id = %data.id, tour_id = %data.tour, user_id = %data.user.id, "Created review");

    Ok((StatusCode::CREATED, Json(Envelope::success(Data { data }))))
}

/// `GET /tours/:id/reviews`
pub async fn get_tour_reviews(
    State(state): State<AppState>,
    ApiPath(tour_id): ApiPath<Uuid>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Listing> {
    let pairs = query_pairs(raw.as_deref())?;
    list_entities::<Review>(&state, &pairs, Some(tour_filter(tour_id)?)).await
}

/// `POST /reviews`
pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(input): ApiJson<CreateReview>,
) -> ApiResult<(StatusCode, Single<Review>)> {
    create(&state, with_defaults(input, None, &auth)).await
}

/// `POST /tours/:id/reviews`
pub async fn create_tour_review(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(tour_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateReview>,
) -> ApiResult<(StatusCode, Single<Review>)> {
    create(&state, with_defaults(input, Some(tour_id), &auth)).await
}
